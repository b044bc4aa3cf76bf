pub mod config;
pub mod migrate;
pub mod status;
pub mod steps;
pub mod version;

use serde::Serialize;
use stratum::OutputFormat;

/// Print a serializable result as JSON when a JSON format is selected
///
/// Returns `false` for table output so the caller can print its own text.
pub(crate) fn print_json<T: Serialize>(value: &T, output_format: OutputFormat) -> bool {
    if !output_format.is_json() {
        return false;
    }
    match output_format.to_json(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
    true
}
