use std::path::PathBuf;

use clap::{Parser, Subcommand};
use support_assist::Result;
use support_assist::commands::{ask_question, build_index, show_status};
use support_assist::config::{Config, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "support-assist")]
#[command(about = "Answer support questions from a document knowledge base")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure model providers and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Build the vector index from a document folder
    Index {
        /// Folder or file to index instead of the configured docs path
        #[arg(long)]
        docs: Option<PathBuf>,
        /// Rebuild even if an index already exists
        #[arg(long)]
        force: bool,
    },
    /// Ask a question against the knowledge base
    Ask {
        /// The question to answer
        question: String,
        /// Session id used to label the conversation
        ///
        /// Sessions live only for this process, so a later `ask` with the
        /// same id starts a fresh conversation.
        #[arg(long)]
        session: Option<String>,
        /// Render sources as markdown
        #[arg(long)]
        markdown: bool,
        /// Fall back to a web search when the knowledge base has no answer
        #[arg(long)]
        web: bool,
    },
    /// Show configuration, provider and index status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Index { docs, force } => {
            build_index(&Config::load_default()?, docs, force).await?;
        }
        Commands::Ask {
            question,
            session,
            markdown,
            web,
        } => {
            ask_question(&Config::load_default()?, question, session, markdown, web).await?;
        }
        Commands::Status => {
            show_status(&Config::load_default()?).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn status_command() {
        let cli = Cli::try_parse_from(["support-assist", "status"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Status));
        }
    }

    #[test]
    fn index_command_defaults() {
        let cli = Cli::try_parse_from(["support-assist", "index"]).expect("should parse");
        if let Commands::Index { docs, force } = cli.command {
            assert_eq!(docs, None);
            assert!(!force);
        } else {
            panic!("expected index command");
        }
    }

    #[test]
    fn index_command_with_options() {
        let cli = Cli::try_parse_from(["support-assist", "index", "--docs", "kb", "--force"])
            .expect("should parse");
        if let Commands::Index { docs, force } = cli.command {
            assert_eq!(docs, Some(PathBuf::from("kb")));
            assert!(force);
        } else {
            panic!("expected index command");
        }
    }

    #[test]
    fn ask_command_with_question() {
        let cli = Cli::try_parse_from(["support-assist", "ask", "How do I reset my password?"])
            .expect("should parse");
        if let Commands::Ask {
            question,
            session,
            markdown,
            web,
        } = cli.command
        {
            assert_eq!(question, "How do I reset my password?");
            assert_eq!(session, None);
            assert!(!markdown);
            assert!(!web);
        } else {
            panic!("expected ask command");
        }
    }

    #[test]
    fn ask_command_with_flags() {
        let cli = Cli::try_parse_from([
            "support-assist",
            "ask",
            "printer offline",
            "--session",
            "ticket-42",
            "--markdown",
            "--web",
        ])
        .expect("should parse");
        if let Commands::Ask {
            session,
            markdown,
            web,
            ..
        } = cli.command
        {
            assert_eq!(session, Some("ticket-42".to_string()));
            assert!(markdown);
            assert!(web);
        } else {
            panic!("expected ask command");
        }
    }

    #[test]
    fn ask_requires_question() {
        let cli = Cli::try_parse_from(["support-assist", "ask"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["support-assist", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["support-assist", "serve"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["support-assist", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
