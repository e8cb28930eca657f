use anyhow::Result;
use serde::Serialize;

use lakeflake_lib::platform::paths::{inputs_cache_dir, store_dir};
use lakeflake_lib::platform::platform_triple;

use crate::output::{OutputFormat, print_json, print_stat};

#[derive(Serialize)]
struct Info {
  platform: Option<String>,
  store: String,
  inputs_cache: String,
}

pub fn cmd_info(format: OutputFormat) -> Result<()> {
  let info = Info {
    platform: platform_triple(),
    store: store_dir().display().to_string(),
    inputs_cache: inputs_cache_dir().display().to_string(),
  };

  if format.is_json() {
    return print_json(&info);
  }

  println!("System:");
  match &info.platform {
    Some(triple) => print_stat("Platform", triple),
    None => print_stat("Platform", "could not detect platform"),
  }
  print_stat("Store", &info.store);
  print_stat("Inputs cache", &info.inputs_cache);
  Ok(())
}
