//! Main entry point for the nupkg-sign CLI application.
//!
//! Local packages are read through seekable files. Packages given as HTTP
//! URLs are read through Range requests, fetching only what a command needs.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::Parser;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Write};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt as _;

use nupkg_sign::cli::Command;
use nupkg_sign::io::{is_http_url, read_fully};
use nupkg_sign::{
    Cli, CmsBackend, CmsFactory, HashAlgorithmName, HttpRangeReader, IntegrityCheck,
    RemotePackage, Settings, package, read_signed_archive_metadata,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if cli.verbose || cli.quiet {
        logger.filter_level(cli.log_level());
    }
    logger.init();

    let mut settings = Settings::from_env()?;
    if let Some(backend) = &cli.cms_backend {
        settings = settings.with_cms_backend(backend.parse::<CmsBackend>()?);
    }

    match &cli.command {
        Command::Inspect { package } => inspect(package),
        Command::IsSigned { package } => is_signed(package, &settings, &cli).await,
        Command::Verify {
            package,
            hash_algorithm,
            expected,
        } => {
            let algorithm = hash_algorithm.parse::<HashAlgorithmName>()?;
            let expected = STANDARD
                .decode(expected)
                .context("--expected is not valid base64")?;
            let mut reader = open_whole(package, &settings, &cli).await?;

            let outcome = package::check_signed_zip_integrity(&mut reader, algorithm, &expected);
            match &outcome {
                IntegrityCheck::Intact => println!("intact"),
                IntegrityCheck::NotSigned => println!("not signed"),
                IntegrityCheck::HashMismatch => println!("hash mismatch"),
                IntegrityCheck::Malformed(reason) => println!("malformed: {reason}"),
            }
            if !outcome.is_intact() {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Hash {
            package,
            hash_algorithm,
        } => {
            let algorithm = hash_algorithm.parse::<HashAlgorithmName>()?;
            let mut reader = open_local(package)?;
            let digest = package::unsigned_archive_hash(&mut reader, algorithm)?;
            println!("{}", STANDARD.encode(digest));
            Ok(())
        }
        Command::ExtractSignature { package, output } => {
            let signature = if is_http_url(package) {
                let reader = Arc::new(HttpRangeReader::new(package.clone(), &settings).await?);
                let signature = RemotePackage::new(reader.clone()).read_signature_file().await?;
                report_transfer(&reader, &cli);
                signature
            } else {
                package::open_signature_file(&mut open_local(Path::new(package))?)?
            };

            write_output(output.as_deref(), &signature).await
        }
        Command::Embed {
            package,
            signature,
            output,
        } => {
            let signature = tokio::fs::read(signature)
                .await
                .with_context(|| format!("reading {}", signature.display()))?;
            let mut reader = open_local(package)?;
            let mut writer = create_output(output)?;
            package::write_signature_into_zip(&mut reader, &signature, &mut writer)?;
            writer.flush()?;
            Ok(())
        }
        Command::Remove { package, output } => {
            let mut reader = open_local(package)?;
            let mut writer = create_output(output)?;
            package::remove_signature(&mut reader, &mut writer)?;
            writer.flush()?;
            Ok(())
        }
        Command::RemoveRepositorySignatures { package, output } => {
            let mut reader = open_local(package)?;
            let mut stripped = Vec::new();
            if package::remove_repository_signatures_with(
                &mut reader,
                &mut stripped,
                settings.cms_backend,
            )? {
                write_output(Some(output.as_path()), &stripped).await?;
                println!("removed");
            } else {
                println!("no repository signatures");
            }
            Ok(())
        }
        Command::ContentHash { package } => {
            println!("{}", package::package_content_hash(&mut open_local(package)?)?);
            Ok(())
        }
        Command::Cms { signature } => {
            let bytes = tokio::fs::read(signature)
                .await
                .with_context(|| format!("reading {}", signature.display()))?;
            let cms = CmsFactory::create_with(&bytes, settings.cms_backend)?;

            println!("engine:                   {}", cms.backend());
            println!("primary signature:        {} bytes", cms.primary_signature_value()?.len());
            println!(
                "unsigned attributes:      {}",
                cms.primary_signature_unsigned_attribute_count()?
            );
            println!("certificates:             {}", cms.certificate_count()?);
            println!(
                "repository countersigned: {}",
                cms.repository_countersignature_value()?.is_some()
            );
            Ok(())
        }
    }
}

fn inspect(package: &Path) -> Result<()> {
    let mut reader = open_local(package)?;
    let metadata = read_signed_archive_metadata(&mut reader)?;

    println!("signed:                         {}", metadata.is_signed());
    println!("zip64:                          {}", metadata.is_zip64);
    if metadata.is_signed() {
        println!(
            "signature local header:         {:#x}",
            metadata.signature_local_file_header_position
        );
        println!(
            "signature entry size:           {}",
            metadata.signature_file_entry_total_size()
        );
        println!(
            "signature data descriptor:      {}",
            metadata.signature_has_data_descriptor
        );
        println!(
            "signature central header:       {:#x} ({} bytes)",
            metadata.signature_central_directory_header_position,
            metadata.signature_central_directory_entry_size()
        );
    }
    println!("central directory:              {:#x}", metadata.central_directory_position);
    if metadata.is_zip64 {
        println!(
            "zip64 end of central directory: {:#x}",
            metadata.zip64_end_of_central_directory_record_position
        );
        println!(
            "zip64 locator:                  {:#x}",
            metadata.zip64_end_of_central_directory_locator_position
        );
    }
    println!(
        "end of central directory:       {:#x}",
        metadata.end_of_central_directory_record_position
    );
    Ok(())
}

async fn is_signed(package: &str, settings: &Settings, cli: &Cli) -> Result<()> {
    let signed = if is_http_url(package) {
        let reader = Arc::new(HttpRangeReader::new(package.to_string(), settings).await?);
        let signed = RemotePackage::new(reader.clone()).is_signed().await?;
        report_transfer(&reader, cli);
        signed
    } else {
        package::is_signed(&mut open_local(Path::new(package))?)
    };

    println!("{signed}");
    Ok(())
}

/// Load `package` into memory as a seekable stream.
async fn open_whole(package: &str, settings: &Settings, cli: &Cli) -> Result<Cursor<Vec<u8>>> {
    let data = if is_http_url(package) {
        let reader = HttpRangeReader::new(package.to_string(), settings).await?;
        let data = read_fully(&reader).await?;
        report_transfer(&reader, cli);
        data
    } else {
        tokio::fs::read(package)
            .await
            .with_context(|| format!("reading {package}"))?
    };
    Ok(Cursor::new(data))
}

/// Write `data` to `path`, or to stdout when no path is given.
async fn write_output(path: Option<&Path>, data: &[u8]) -> Result<()> {
    match path {
        Some(path) => tokio::fs::write(path, data)
            .await
            .with_context(|| format!("writing {}", path.display())),
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(data).await?;
            stdout.flush().await?;
            Ok(())
        }
    }
}

fn open_local(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn create_output(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn report_transfer(reader: &HttpRangeReader, cli: &Cli) {
    if !cli.quiet {
        eprintln!("Total bytes transferred: {}", format_size(reader.transferred_bytes()));
    }
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
