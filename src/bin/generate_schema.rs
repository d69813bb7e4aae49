//! Generate JSON Schema for the cloud-explorer configuration
//!
//! Usage:
//!   cargo run --features dev-bins --bin generate_schema > config-schema.json

use cloud_explorer::config::Config;
use schemars::schema_for;

fn main() -> Result<(), serde_json::Error> {
    let schema = schema_for!(Config);
    let output = serde_json::to_string_pretty(&schema)?;
    println!("{}", output);
    Ok(())
}
