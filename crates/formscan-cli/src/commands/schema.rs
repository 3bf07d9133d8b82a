use formscan_core::config::Settings;
use formscan_core::error::FormscanError;
use serde_json::json;

use crate::commands::load_schema;
use crate::output;

/// Print every declared field with its comparison type.
pub fn run(settings: &Settings, output_format: &str) -> Result<(), FormscanError> {
    let catalog = load_schema(settings)?.catalog();

    let output_str = match output_format {
        "json" => {
            let entries: Vec<_> = catalog
                .entries()
                .into_iter()
                .map(|(section, field, ty)| json!({"section": section, "field": field, "type": ty}))
                .collect();
            serde_json::to_string_pretty(&entries)?
        }
        _ => output::table::format_catalog(&catalog),
    };
    println!("{output_str}");
    Ok(())
}
