use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;

use byteorder::ReadBytesExt;
use clap::Parser;
use ignore::WalkBuilder;
use log::{debug, info, warn};

use datapack::buf::BufferPool;
use datapack::clock::SystemClock;
use datapack::config::Config;
use datapack::crypto::{self, Ed25519SignAlgorithm, SignAlgorithm};
use datapack::format::{sign, DATE_FORMAT};
use datapack::hash;
use datapack::window::SharedSource;
use datapack::{Attached, DataPack, DataPackReader, DataPackWriter, DataPair, DataPart, Detached, Result};

mod cli;
use crate::cli::Cli;
use crate::cli::Commands;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("datapack: {}", e);
            ExitCode::FAILURE
        },
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    crypto::init()?;
    let config = Config::load(cli.config.as_deref())?;
    debug!("CONFIG: {:?}", config);

    match cli.command {
        Commands::Pack {
            output,
            prefix,
            description,
            headers,
            properties,
            key,
            inputs,
        } => {
            let mut pack = DataPack::new(prefix.or(config.prefix.clone()).unwrap_or_default())?;
            pack.stamp(&SystemClock)?;
            pack.description = description;
            for (name, value) in headers {
                pack.headers.add_pair(DataPair::new(name, value)?);
            }
            for (name, value) in properties {
                pack.properties.add_or_replace(DataPair::new(name, value)?);
            }

            for input in &inputs {
                add_files(&mut pack, input)?;
            }

            let algorithm = match key {
                Some(key) => Some(Ed25519SignAlgorithm::from_key_pair(&fs::read_to_string(key)?)?),
                None => None,
            };

            let mut out = create(&output)?;
            let written = DataPackWriter::with_pool(config.pool()).write(
                &pack,
                &mut out,
                algorithm.as_ref().map(|a| a as &dyn SignAlgorithm),
            )?;
            info!("wrote {} parts, {} bytes to {}", pack.parts.len(), written, output.display());
        },
        Commands::List { file, prefix, attached } => {
            let expected = prefix.or(config.prefix.clone());
            let pack = if attached || config.attached {
                let mut source = SharedSource::new(File::open(&file)?);
                DataPackReader::with(Attached).read_str(&mut source, expected.as_deref())?
            } else {
                DataPackReader::with(Detached::with(config.scratch(), config.pool()))
                    .read_str(&mut File::open(&file)?, expected.as_deref())?
            };
            print_pack(&file, &pack, &config.pool())?;
        },
        Commands::Extract { file, dir, prefix } => {
            let expected = prefix.or(config.prefix.clone());
            let pack = DataPackReader::with(Detached::with(config.scratch(), config.pool()))
                .read_str(&mut File::open(&file)?, expected.as_deref())?;

            let pool = config.pool();
            for (idx, part) in pack.parts.iter().enumerate() {
                let name = match part.properties.value("FileName") {
                    Some(name) => name.to_string(),
                    None => format!("part-{}.bin", idx),
                };
                let target = match contained(&dir, &name) {
                    Some(target) => target,
                    None => {
                        warn!("SKIP: part {} name {:?} escapes {}", idx, name, dir.display());
                        continue;
                    },
                };

                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                let size = part.copy_to(&mut File::create(&target)?, &pool)?;
                info!("EXTRACT: {} ({} bytes)", target.display(), size);
            }
        },
        Commands::Sign { input, output, key } => {
            let algorithm = Ed25519SignAlgorithm::from_key_pair(&fs::read_to_string(key)?)?;
            let mut source = File::open(&input)?;
            let prefix_size = peek_prefix_size(&mut source)?;

            sign::sign(prefix_size, &algorithm, &mut BufReader::new(source), &mut create(&output)?)?;
            info!("signed {} into {}", input.display(), output.display());
        },
        Commands::Verify { file, key } => {
            let algorithm = load_verifier(&fs::read_to_string(key)?)?;
            let mut source = File::open(&file)?;
            let prefix_size = peek_prefix_size(&mut source)?;

            if sign::is_sign_match(prefix_size, &algorithm, &mut source)? {
                println!("{}: signature OK", file.display());
            } else {
                println!("{}: signature MISMATCH", file.display());
                return Ok(ExitCode::FAILURE);
            }
        },
        Commands::Unsign { input, output } => {
            let mut source = File::open(&input)?;
            let prefix_size = peek_prefix_size(&mut source)?;

            sign::remove_sign(prefix_size, &mut BufReader::new(source), &mut create(&output)?)?;
            info!("unsigned {} into {}", input.display(), output.display());
        },
        Commands::Keygen { output } => {
            let key_pair = Ed25519SignAlgorithm::generate_key_pair()?;
            let public = Ed25519SignAlgorithm::public_key(&key_pair)?;

            let mut public_path = OsString::from(output.as_os_str());
            public_path.push(".pub");

            fs::write(&output, key_pair)?;
            fs::write(&public_path, public)?;
            println!("key pair: {}", output.display());
            println!("public key: {}", Path::new(&public_path).display());
        },
    }
    Ok(ExitCode::SUCCESS)
}

// Truncating, and readable since signing reads the payload back
fn create(path: &Path) -> io::Result<File> {
    OpenOptions::new().read(true).write(true).create(true).truncate(true).open(path)
}

fn peek_prefix_size(file: &mut File) -> Result<u8> {
    let size = file.read_u8()?;
    file.seek(SeekFrom::Start(0))?;
    Ok(size)
}

// Either half of a key works for checking
fn load_verifier(text: &str) -> Result<Ed25519SignAlgorithm> {
    Ed25519SignAlgorithm::from_public_key(text).or_else(|_| Ed25519SignAlgorithm::from_key_pair(text))
}

fn add_files(pack: &mut DataPack, input: &Path) -> Result<()> {
    for entry in WalkBuilder::new(input)
        .standard_filters(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("SKIP: {}", e);
                continue;
            },
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let path = entry.path();
        let length = entry.metadata().map_err(io::Error::other)?.len();
        let name = part_name(input, path);
        info!("PACK: {} ({} bytes)", name, length);

        let part = pack.add_part(DataPart::new(path.to_path_buf()));
        part.properties.set("FileName", &name)?;
        part.properties.set("Length", &length.to_string())?;
    }
    Ok(())
}

// Relative to the walked directory, or the bare file name for a file input
fn part_name(input: &Path, path: &Path) -> String {
    let relative = match path.strip_prefix(input) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel,
        _ => path.file_name().map(Path::new).unwrap_or(path),
    };
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// None when the name is absolute or climbs out of `dir`
fn contained(dir: &Path, name: &str) -> Option<PathBuf> {
    let name = Path::new(name);
    if name.as_os_str().is_empty() || !name.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(dir.join(name))
}

fn print_pack(file: &Path, pack: &DataPack, pool: &dyn BufferPool) -> Result<()> {
    println!("{}", file.display());
    println!("\tprefix: {:?}", String::from_utf8_lossy(pack.prefix()));
    if let Some(date) = pack.date_create {
        println!("\tcreated: {}", date.format(DATE_FORMAT)?);
    }
    if let Some(description) = &pack.description {
        println!("\tdescription: {}", description);
    }
    if let Some(info) = pack.sign_info() {
        let mut signature = vec![0u8; info.sign_size as usize];
        let mut source = File::open(file)?;
        source.seek(SeekFrom::End(-(info.sign_size as i64)))?;
        source.read_exact(&mut signature)?;
        println!("\tsigned: {} protected bytes, signature {}", info.protected_size, hex::encode(&signature));
    }
    for pair in &pack.headers {
        println!("\theader: {}", pair);
    }
    for pair in &pack.properties {
        println!("\tproperty: {}", pair);
    }

    for (idx, part) in pack.parts.iter().enumerate() {
        let size = part.copy_to(&mut io::sink(), pool)?;
        let digest = hash::digest(&mut part.open()?)?;
        println!("\tpart {}: {} bytes, blake3 {}", idx, size, hash::to_hex(&digest));
        for pair in &part.headers {
            println!("\t\theader: {}", pair);
        }
        for pair in &part.properties {
            println!("\t\tproperty: {}", pair);
        }
    }
    Ok(())
}
