//! `order`: show the order `run` would activate plugins in.

use serde::Serialize;
use serde_json::json;
use tabled::Tabled;

use keystone_core::AppResult;
use keystone_core::config::AppConfig;

use crate::output::{self, OutputFormat};

#[derive(Debug, Serialize, Tabled)]
struct OrderRow {
    #[tabled(rename = "#")]
    position: usize,
    name: String,
}

pub async fn execute(config: &AppConfig, format: OutputFormat) -> AppResult<()> {
    let loader = super::build_loader(config);
    let discovered = loader.discover().await;
    let resolved = loader.resolve_load_order(&discovered);

    match format {
        OutputFormat::Json => output::print_json(&json!({
            "order": resolved.order,
            "cyclic": resolved.cyclic,
        })),
        OutputFormat::Table => {
            let rows: Vec<OrderRow> = resolved
                .order
                .iter()
                .enumerate()
                .map(|(i, name)| OrderRow {
                    position: i + 1,
                    name: name.clone(),
                })
                .collect();
            output::print_list(&rows, format);
            if resolved.has_cycle() {
                output::print_warning(&format!(
                    "Excluded by circular dependencies: {}",
                    resolved.cyclic.join(", ")
                ));
            }
        }
    }
    Ok(())
}
