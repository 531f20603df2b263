//! CLI command definitions using clap.
//!
//! - fix: run the plan/execute/review loop for one issue
//! - plans: inspect the plan cache
//! - graph: index the working copy or query the code graph

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// fixloop - iterative issue resolution with a plan cache
#[derive(Parser, Debug)]
#[command(name = "fixloop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Working copy selection shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct RepoArgs {
    /// Working copy directory (defaults to git.work_dir from config)
    #[arg(short, long)]
    pub path: Option<PathBuf>,
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve an issue in a working copy
    Fix {
        /// Issue description
        #[arg(short, long)]
        issue: String,

        /// Repository to clone when the working copy is missing
        #[arg(long)]
        repo_url: Option<String>,

        #[command(flatten)]
        repo: RepoArgs,

        /// Remove the working copy and structural graph before starting
        #[arg(long)]
        clean: bool,

        /// Commit and push the working copy after a resolved run
        #[arg(long)]
        push: bool,

        /// Keep a working copy this run cloned
        #[arg(long)]
        keep: bool,

        /// Override runner.max_rounds
        #[arg(long)]
        max_rounds: Option<u32>,
    },

    /// Inspect cached plans
    Plans {
        #[command(subcommand)]
        command: PlansCommands,
    },

    /// Code graph operations
    Graph {
        #[command(subcommand)]
        command: GraphCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum PlansCommands {
    /// List every cached plan, newest first
    List {
        #[command(flatten)]
        repo: RepoArgs,
    },

    /// Show one cached plan
    Show {
        /// Record id
        id: String,

        #[command(flatten)]
        repo: RepoArgs,
    },

    /// Cached plans that touched a file
    ForFile {
        /// File path as it appears in plan steps
        file: String,

        #[command(flatten)]
        repo: RepoArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum GraphCommands {
    /// Register every file of the working copy as a File node
    Index {
        #[command(flatten)]
        repo: RepoArgs,
    },

    /// Run a read-only SQL query against the graph
    Query {
        /// SQL statement
        sql: String,

        #[command(flatten)]
        repo: RepoArgs,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_fix() {
        let cli = Cli::try_parse_from([
            "fixloop",
            "fix",
            "--issue",
            "crash on empty input",
            "--repo-url",
            "https://example.com/repo.git",
            "--clean",
            "--max-rounds",
            "3",
        ])
        .unwrap();

        match cli.command {
            Commands::Fix {
                issue,
                repo_url,
                repo,
                clean,
                push,
                keep,
                max_rounds,
            } => {
                assert_eq!(issue, "crash on empty input");
                assert_eq!(repo_url.as_deref(), Some("https://example.com/repo.git"));
                assert!(repo.path.is_none());
                assert!(clean);
                assert!(!push);
                assert!(!keep);
                assert_eq!(max_rounds, Some(3));
            }
            _ => panic!("Expected Fix command"),
        }
    }

    #[test]
    fn test_cli_parse_plans_for_file() {
        let cli = Cli::try_parse_from(["fixloop", "plans", "for-file", "src/app.py", "--path", "/tmp/repo"]).unwrap();
        match cli.command {
            Commands::Plans {
                command: PlansCommands::ForFile { file, repo },
            } => {
                assert_eq!(file, "src/app.py");
                assert_eq!(repo.path, Some(PathBuf::from("/tmp/repo")));
            }
            _ => panic!("Expected Plans ForFile command"),
        }
    }

    #[test]
    fn test_cli_parse_graph_query() {
        let cli = Cli::try_parse_from(["fixloop", "-v", "graph", "query", "SELECT count(*) FROM nodes"]).unwrap();
        assert!(cli.is_verbose());
        assert!(matches!(
            cli.command,
            Commands::Graph {
                command: GraphCommands::Query { .. }
            }
        ));
    }

    #[test]
    fn test_cli_global_config() {
        let cli = Cli::try_parse_from(["fixloop", "plans", "list", "--config", "/tmp/f.yml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/f.yml")));
    }

    #[test]
    fn test_fix_requires_issue() {
        assert!(Cli::try_parse_from(["fixloop", "fix"]).is_err());
    }
}
