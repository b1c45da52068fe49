use crate::domain::plan::{PullReport, SyncOperation};
use colored::*;
use tabled::settings::{object::Columns, Alignment, Modify, Style};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct OperationRow {
    operation: String,
    flow: String,
    source: String,
    target: String,
}

#[derive(Tabled)]
struct ErrorRow {
    flow: String,
    error: String,
}

fn operation_row(op: &SyncOperation) -> OperationRow {
    match op {
        SyncOperation::Create { git_flow } => OperationRow {
            operation: "CREATE".green().to_string(),
            flow: git_flow.definition.display_name.clone(),
            source: git_flow.source_id.0.clone(),
            target: "-".to_string(),
        },
        SyncOperation::Update {
            git_flow,
            target_flow,
        } => OperationRow {
            operation: "UPDATE".yellow().to_string(),
            flow: git_flow.definition.display_name.clone(),
            source: git_flow.source_id.0.clone(),
            target: target_flow.target_id.0.clone(),
        },
        SyncOperation::Delete { target_flow } => OperationRow {
            operation: "DELETE".red().to_string(),
            flow: target_flow.definition.display_name.clone(),
            source: "-".to_string(),
            target: target_flow.target_id.0.clone(),
        },
    }
}

pub fn print_pull_summary(report: &PullReport) {
    println!();

    let header = if report.dry_run {
        "FLOWSYNC PULL PLAN (dry run)"
    } else {
        "FLOWSYNC PULL RESULT"
    };
    println!("{}", header.bold().cyan());
    println!("Plan: {}", report.plan.plan_id.bright_yellow());
    println!();

    if report.plan.is_empty() {
        println!("{}", "Everything in sync — no operations.".italic());
    } else {
        let rows: Vec<OperationRow> = report.plan.operations.iter().map(operation_row).collect();
        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..=3)).with(Alignment::left()))
            .to_string();
        println!("{table}");

        let s = &report.plan.summary;
        println!(
            "{} creates, {} updates, {} deletes ({} total)",
            s.creates.to_string().green(),
            s.updates.to_string().yellow(),
            s.deletes.to_string().red(),
            s.total.to_string().bold(),
        );
    }

    if !report.errors.is_empty() {
        println!();
        println!("{}", "Republish errors (non-fatal):".bold().red());
        let rows: Vec<ErrorRow> = report
            .errors
            .iter()
            .map(|e| ErrorRow {
                flow: e.flow_id.clone(),
                error: e.message.clone(),
            })
            .collect();
        let table = Table::new(rows).with(Style::rounded()).to_string();
        println!("{table}");
    }
}
