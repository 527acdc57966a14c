use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use coding_store::config::{connect, StoreConfig};
use coding_store::store::StoreConnection;
use coding_store::{Code, CodeData, CodingDao, IdMap, ImportData, ModelCache, Tag};

type Dao = CodingDao<Box<dyn StoreConnection>>;
type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(author, version, about = "Manage behavioral observation coding data")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the tables if the database is not initialized yet
    Init {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Drop all coding tables
    Drop {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show whether the schema exists and how much data it holds
    Status {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List codes sorted by name
    Codes {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List tags sorted by value
    Tags {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Add a code and print its id
    AddCode {
        #[arg(short, long)]
        config: PathBuf,
        name: String,
    },
    /// Add a tag and print its id
    AddTag {
        #[arg(short, long)]
        config: PathBuf,
        value: String,
    },
    /// Register an imported recording and print its id
    AddImport {
        #[arg(short, long)]
        config: PathBuf,
        /// Media file name, e.g. s01.mp4
        filename: String,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        family: i64,
        #[arg(long)]
        participant: i32,
        #[arg(long, default_value = "")]
        alias: String,
        /// Recording date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
    },
    /// Code an interval of an import and print the entry id
    AddCodeData {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        import: i64,
        #[arg(long)]
        code: i64,
        /// Start of the interval in milliseconds
        #[arg(long)]
        time: u32,
        /// Length of the interval in milliseconds
        #[arg(long)]
        duration: u32,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Print code data of one import or one family
    CodeData {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, conflicts_with = "family", required_unless_present = "family")]
        import: Option<i64>,
        #[arg(long)]
        family: Option<i64>,
    },
}

fn main() -> CliResult {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match args.command {
        Command::Init { config } => init(&config),
        Command::Drop { config } => drop_tables(&config),
        Command::Status { config } => status(&config),
        Command::Codes { config } => list_codes(&config),
        Command::Tags { config } => list_tags(&config),
        Command::AddCode { config, name } => {
            let dao = open_dao(&config)?;
            print_id("code", dao.insert_new_code(&Code::new(name)))
        }
        Command::AddTag { config, value } => {
            let dao = open_dao(&config)?;
            print_id("tag", dao.insert_new_tag(&Tag::new(value)))
        }
        Command::AddImport {
            config,
            filename,
            year,
            family,
            participant,
            alias,
            date,
        } => {
            let dao = open_dao(&config)?;
            let import = ImportData::new(filename, year, family, participant, alias, date);
            print_id("import", dao.insert_import_data(&import))
        }
        Command::AddCodeData {
            config,
            import,
            code,
            time,
            duration,
            comment,
        } => {
            let dao = open_dao(&config)?;
            let code = dao
                .get_code(code)?
                .remove(&code)
                .ok_or_else(|| format!("Code {} does not exist", code))?;
            let entry = CodeData::new(import, time, duration, code, comment);
            print_id("code data", dao.insert_code_data(&entry))
        }
        Command::CodeData {
            config,
            import,
            family,
        } => {
            let dao = open_dao(&config)?;
            let entries = match (import, family) {
                (Some(import_id), _) => dao.get_code_data_from_import(import_id)?,
                (None, Some(family_id)) => dao.get_code_data_from_family_id(family_id)?,
                (None, None) => IdMap::new(),
            };
            print_code_data(entries.values());
            Ok(())
        }
    }
}

fn load(config_path: &Path) -> Result<(StoreConfig, Dao), Box<dyn std::error::Error>> {
    let config = StoreConfig::load(config_path).map_err(|e| e.to_string())?;
    let conn = connect(&config.database).map_err(|e| e.to_string())?;
    info!("Using {:?} store", conn.mode());
    Ok((config, CodingDao::new(conn)))
}

fn open_dao(config_path: &Path) -> Result<Dao, Box<dyn std::error::Error>> {
    let (_, dao) = load(config_path)?;
    Ok(dao)
}

/// Load the cache from an initialized store
fn open_cache(config_path: &Path) -> Result<ModelCache, Box<dyn std::error::Error>> {
    let (config, dao) = load(config_path)?;
    if !dao.is_database_initialized() {
        return Err("Database is not initialized; run `coding-store init` first".into());
    }
    let cache = ModelCache::new();
    if !cache.initialize(Arc::new(dao), config.model.cache) {
        return Err("Failed to load the model cache".into());
    }
    Ok(cache)
}

fn init(config_path: &Path) -> CliResult {
    let dao = open_dao(config_path)?;
    if dao.is_database_initialized() {
        println!("Database already initialized");
        return Ok(());
    }
    if !dao.create_tables(dao.mode()) {
        return Err("Failed to create tables".into());
    }
    println!("Database initialized");
    Ok(())
}

fn drop_tables(config_path: &Path) -> CliResult {
    let dao = open_dao(config_path)?;
    if !dao.drop_tables() {
        return Err("Failed to drop tables".into());
    }
    println!("Tables dropped");
    Ok(())
}

fn status(config_path: &Path) -> CliResult {
    let (config, dao) = load(config_path)?;
    if !dao.is_database_initialized() {
        println!("initialized: false");
        return Ok(());
    }
    let cache = ModelCache::new();
    if !cache.initialize(Arc::new(dao), config.model.cache) {
        return Err("Failed to load the model cache".into());
    }
    println!("initialized: true");
    println!("imports:   {}", cache.imports().len());
    println!("codes:     {}", cache.codes().len());
    println!("tags:      {}", cache.tags().len());
    println!("code data: {}", cache.code_data().len());
    Ok(())
}

fn list_codes(config_path: &Path) -> CliResult {
    let cache = open_cache(config_path)?;
    for code in cache.code_list().iter() {
        println!("{:>6}  {}", code.id, code.name);
    }
    Ok(())
}

fn list_tags(config_path: &Path) -> CliResult {
    let cache = open_cache(config_path)?;
    for tag in cache.tag_list().iter() {
        println!("{:>6}  {}", tag.id, tag.value);
    }
    Ok(())
}

fn print_id(what: &str, id: Option<i64>) -> CliResult {
    let id = id.ok_or_else(|| format!("Failed to insert {}", what))?;
    println!("{}", id);
    Ok(())
}

fn print_code_data<'a>(entries: impl Iterator<Item = &'a CodeData>) {
    for entry in entries {
        println!(
            "{:>6}  import {:>4}  {:>8}..{:<8} ms  {}  {}",
            entry.id,
            entry.import_id,
            entry.time,
            entry.end_time(),
            entry.code.name,
            entry.comment.as_deref().unwrap_or("")
        );
    }
}
