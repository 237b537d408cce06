use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "nupkg-sign")]
#[command(version)]
#[command(about = "Embed, locate and verify package signatures in ZIP archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  nupkg-sign is-signed https://example.com/pkg.nupkg   check a remote package\n  \
  nupkg-sign hash pkg.nupkg --hash-algorithm sha512    hash the unsigned content\n  \
  nupkg-sign embed pkg.nupkg --signature sig.p7s -o signed.nupkg")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log debug output
    #[arg(short = 'v', long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// CMS engine: auto, managed or native
    #[arg(long, global = true, value_name = "BACKEND")]
    pub cms_backend: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the positions of the signature entry and trailing records
    Inspect {
        /// Package path
        package: PathBuf,
    },

    /// Report whether a package carries a signature entry
    IsSigned {
        /// Package path or HTTP URL
        package: String,
    },

    /// Check the package against the hash recorded at signing time
    Verify {
        /// Package path or HTTP URL
        package: String,
        #[arg(long, default_value = "sha256")]
        hash_algorithm: String,
        /// Expected hash, base64
        #[arg(long)]
        expected: String,
    },

    /// Print the base64 hash of the package as it was before signing
    Hash {
        package: PathBuf,
        #[arg(long, default_value = "sha256")]
        hash_algorithm: String,
    },

    /// Write the signature entry's bytes to a file, or stdout
    ExtractSignature {
        /// Package path or HTTP URL
        package: String,
        #[arg(short = 'o', long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Add a signature entry to an unsigned package
    Embed {
        package: PathBuf,
        #[arg(long, value_name = "P7S")]
        signature: PathBuf,
        #[arg(short = 'o', long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Write the package without its signature entry
    Remove {
        package: PathBuf,
        #[arg(short = 'o', long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Strip repository signatures and countersignatures
    RemoveRepositorySignatures {
        package: PathBuf,
        #[arg(short = 'o', long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Print the base64 SHA-512 content hash
    ContentHash { package: PathBuf },

    /// Summarise a detached signature file
    Cms {
        #[arg(value_name = "P7S")]
        signature: PathBuf,
    },
}

impl Cli {
    pub fn log_level(&self) -> log::LevelFilter {
        if self.verbose {
            log::LevelFilter::Debug
        } else if self.quiet {
            log::LevelFilter::Error
        } else {
            log::LevelFilter::Warn
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_verify() {
        let cli = Cli::parse_from([
            "nupkg-sign",
            "-v",
            "verify",
            "pkg.nupkg",
            "--hash-algorithm",
            "sha512",
            "--expected",
            "AAAA",
        ]);
        assert_eq!(cli.log_level(), log::LevelFilter::Debug);
        let Command::Verify {
            package,
            hash_algorithm,
            expected,
        } = cli.command
        else {
            panic!("expected verify");
        };
        assert_eq!(package, "pkg.nupkg");
        assert_eq!(hash_algorithm, "sha512");
        assert_eq!(expected, "AAAA");
    }

    #[test]
    fn global_backend_flag_after_subcommand() {
        let cli = Cli::parse_from(["nupkg-sign", "cms", "sig.p7s", "--cms-backend", "managed"]);
        assert_eq!(cli.cms_backend.as_deref(), Some("managed"));
        assert_eq!(cli.log_level(), log::LevelFilter::Warn);
    }

    #[test]
    fn remove_repository_signatures_needs_output() {
        assert!(
            Cli::try_parse_from(["nupkg-sign", "remove-repository-signatures", "pkg.nupkg"])
                .is_err()
        );
        let cli = Cli::parse_from([
            "nupkg-sign",
            "remove-repository-signatures",
            "pkg.nupkg",
            "-o",
            "out.nupkg",
        ]);
        assert!(matches!(
            cli.command,
            Command::RemoveRepositorySignatures { output, .. } if output == PathBuf::from("out.nupkg")
        ));
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["nupkg-sign", "-v", "-q", "content-hash", "a"]).is_err());
    }
}
