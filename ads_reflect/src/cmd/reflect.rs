/* Binary for inspecting controller metadata uploads and memory images offline */

use ads_reflect::{BridgeConfig, CatalogBlob, MemoryTransport, SymbolBridge, UploadInfo};
use ads_types::describe_code;
use anyhow::{anyhow, bail, Context};
use clap::{ArgGroup, Parser as ClapParser};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(ClapParser)]
#[command(name = "ads-reflect")]
#[command(about = "Decode and encode controller variables from captured metadata and memory")]
#[command(group(ArgGroup::new("action").required(true).args(["list", "info", "read", "write"])))]
struct Args {
  /* Type catalog upload */
  #[arg(long, required = true)]
  datatypes: PathBuf,

  /* Number of records announced for the type upload */
  #[arg(long, required_unless_present = "upload_info")]
  datatype_count: Option<u32>,

  /* Symbol catalog upload */
  #[arg(long, required = true)]
  symbols: PathBuf,

  /* Number of records announced for the symbol upload */
  #[arg(long, required_unless_present = "upload_info")]
  symbol_count: Option<u32>,

  /* Captured upload info block; supplies both record counts */
  #[arg(long)]
  upload_info: Option<PathBuf>,

  /* Memory image per index group, e.g. 0x4020=plc.bin */
  #[arg(short, long, value_parser = parse_memory_image)]
  memory: Vec<MemoryImage>,

  /* JSON bridge configuration */
  #[arg(short, long)]
  config: Option<PathBuf>,

  /* List all symbols */
  #[arg(long)]
  list: bool,

  /* Print the resolved type of a symbol */
  #[arg(long, value_name = "SYMBOL")]
  info: Option<String>,

  /* Decode a symbol's value */
  #[arg(long, value_name = "SYMBOL")]
  read: Option<String>,

  /* Encode a JSON value into a symbol */
  #[arg(long, value_name = "SYMBOL", requires = "value")]
  write: Option<String>,

  /* JSON value for --write */
  #[arg(long)]
  value: Option<String>,

  /* Write modified memory images back to their files */
  #[arg(long, requires = "write")]
  save: bool,

  /* Pretty print JSON output */
  #[arg(short, long)]
  pretty: bool,
}

#[derive(Clone, Debug)]
struct MemoryImage {
  index_group: u32,
  path: PathBuf,
}

fn parse_memory_image(raw: &str) -> Result<MemoryImage, String> {
  let (group, path) = raw
    .split_once('=')
    .ok_or_else(|| format!("expected GROUP=FILE, got '{}'", raw))?;
  let index_group = match group.strip_prefix("0x").or_else(|| group.strip_prefix("0X")) {
    Some(hex) => u32::from_str_radix(hex, 16),
    None => group.parse::<u32>(),
  }
  .map_err(|e| format!("invalid index group '{}': {}", group, e))?;
  Ok(MemoryImage {
    index_group,
    path: PathBuf::from(path),
  })
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
  let json = if pretty {
    serde_json::to_string_pretty(value)?
  } else {
    serde_json::to_string(value)?
  };
  println!("{}", json);
  Ok(())
}

fn main() -> anyhow::Result<()> {
  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr))
    .with(EnvFilter::from_default_env())
    .init();
  let args = Args::parse();

  /* Load configuration */
  let config = match &args.config {
    Some(path) => {
      let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
      BridgeConfig::from_json(&text).with_context(|| format!("parsing config {}", path.display()))?
    }
    None => BridgeConfig::default(),
  };

  /* Record counts: explicit flags win over the upload info block */
  let info = match &args.upload_info {
    Some(path) => {
      let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
      Some(UploadInfo::parse(&bytes).with_context(|| format!("parsing {}", path.display()))?)
    }
    None => None,
  };
  let datatype_count = args
    .datatype_count
    .or(info.map(|i| i.datatype_count))
    .context("no datatype count given")?;
  let symbol_count = args
    .symbol_count
    .or(info.map(|i| i.symbol_count))
    .context("no symbol count given")?;

  /* Stage the captured controller state */
  let device = Arc::new(MemoryTransport::new());
  let types = CatalogBlob {
    bytes: std::fs::read(&args.datatypes)
      .with_context(|| format!("reading {}", args.datatypes.display()))?,
    declared_count: datatype_count,
  };
  let symbols = CatalogBlob {
    bytes: std::fs::read(&args.symbols)
      .with_context(|| format!("reading {}", args.symbols.display()))?,
    declared_count: symbol_count,
  };
  if let Some(info) = info {
    if info.datatype_size as usize != types.bytes.len()
      || info.symbol_size as usize != symbols.bytes.len()
    {
      tracing::warn!(
        datatype_size = info.datatype_size,
        datatypes = types.bytes.len(),
        symbol_size = info.symbol_size,
        symbols = symbols.bytes.len(),
        "upload sizes differ from the upload info block"
      );
    }
  }
  device.set_catalogs(types, symbols);
  for image in &args.memory {
    let bytes =
      std::fs::read(&image.path).with_context(|| format!("reading {}", image.path.display()))?;
    device.set_region(image.index_group, bytes);
  }

  /* Build the catalog once */
  let bridge = SymbolBridge::new(device.clone(), config);
  bridge
    .refresher()
    .refresh_once()
    .map_err(|e| anyhow!("Failed to load catalogs: {}", e))?;

  if args.list {
    return print_json(&bridge.symbols_json()?, args.pretty);
  }

  if let Some(name) = &args.info {
    let (_, resolved) = bridge.resolve_symbol(name)?;
    return print_json(&resolved, args.pretty);
  }

  if let Some(name) = &args.read {
    let decoded = bridge.read_symbol_partial(name)?;
    print_json(&decoded.value, args.pretty)?;
    if let Some(err) = decoded.error {
      bail!(
        "'{}' decoded with errors: {} (code {:#x}, {})",
        name,
        err,
        err.code(),
        describe_code(err.code())
      );
    }
    return Ok(());
  }

  if let (Some(name), Some(raw)) = (&args.write, &args.value) {
    let value: serde_json::Value =
      serde_json::from_str(raw).with_context(|| format!("parsing value for '{}'", name))?;
    let outcome = bridge.write_symbol(name, &value);

    /* Partial writes still landed; persist them before reporting */
    if args.save {
      for image in &args.memory {
        if let Some(bytes) = device.region(image.index_group) {
          std::fs::write(&image.path, bytes)
            .with_context(|| format!("writing {}", image.path.display()))?;
        }
      }
    }
    outcome.map_err(|e| {
      anyhow!(
        "Failed to write '{}': {} (code {:#x}, {})",
        name,
        e,
        e.code(),
        describe_code(e.code())
      )
    })?;
    return print_json(&bridge.read_symbol(name)?, args.pretty);
  }

  Ok(())
}
