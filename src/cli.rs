use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use crate::auth::Token;
use crate::config::Config;
use crate::mcp::{serve_stdio, tool_catalog, McpHandler, Toolbox};
use crate::output::{print_banner, print_tool_catalog, Spinner};
use crate::travis::TravisClient;

#[derive(Parser)]
#[command(name = "travis-lens")]
#[command(author, version, about = "Travis CI tools for MCP clients", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (default: ./travis-lens.toml or the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Travis API token
    #[arg(short, long, global = true, env = "TRAVIS_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Travis API base URL
    #[arg(short, long, global = true, env = "TRAVIS_API_URL")]
    url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server on stdin/stdout (default)
    Serve,

    /// Print the build insights report for a repository
    Insights {
        /// Repository slug (owner/name)
        #[arg(short, long)]
        repo: String,

        #[arg(short, long)]
        branch: Option<String>,

        /// Number of builds to analyze (max 100)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Print optimization recommendations for a build
    Optimize {
        #[arg(short = 'B', long)]
        build_id: u64,
    },

    /// List the tools exposed to MCP clients
    Tools,
}

impl Cli {
    /// Loads configuration, with command-line flags taking precedence.
    pub fn load_config(&self) -> Result<Config> {
        let config = Config::load(self.config.as_deref())?;
        Ok(config.with_overrides(self.token.clone(), self.url.clone()))
    }

    fn toolbox(config: &Config) -> Result<Toolbox> {
        let token = config.travis.token.as_deref().map(Token::from);
        let client = TravisClient::new(&config.travis.api_url, &config.travis.web_url, token)
            .context("Failed to create Travis client")?;
        Ok(Toolbox::new(client, config.analysis.clone()))
    }

    async fn execute_serve(config: &Config) -> Result<()> {
        if config.travis.token.is_none() {
            info!("No Travis API token configured; only public data will be available");
        }
        let handler = McpHandler::new(Self::toolbox(config)?);
        serve_stdio(&handler).await.context("MCP server failed")
    }

    async fn execute_insights(
        config: &Config,
        repo: &str,
        branch: Option<&str>,
        limit: Option<usize>,
    ) -> Result<()> {
        info!("Collecting build insights for {repo}");
        let toolbox = Self::toolbox(config)?;

        let spinner = Spinner::start("Fetching and analyzing builds");
        match toolbox.build_insights(repo, branch, limit).await {
            Ok(report) => {
                spinner.finish("Builds analyzed");
                println!("{report}");
                Ok(())
            }
            Err(e) => {
                spinner.fail("Could not analyze builds");
                Err(e).with_context(|| format!("Failed to collect insights for {repo}"))
            }
        }
    }

    async fn execute_optimize(config: &Config, build_id: u64) -> Result<()> {
        info!("Analyzing job logs of build {build_id}");
        let toolbox = Self::toolbox(config)?;

        let spinner = Spinner::start("Fetching build and job logs");
        match toolbox.optimization_recommendations(build_id).await {
            Ok(report) => {
                spinner.finish("Job logs analyzed");
                println!("{report}");
                Ok(())
            }
            Err(e) => {
                spinner.fail("Could not analyze build");
                Err(e).with_context(|| format!("Failed to analyze build {build_id}"))
            }
        }
    }

    pub async fn execute(&self, config: &Config) -> Result<()> {
        match &self.command {
            None | Some(Commands::Serve) => Self::execute_serve(config).await,
            Some(Commands::Insights {
                repo,
                branch,
                limit,
            }) => {
                print_banner();
                Self::execute_insights(config, repo, branch.as_deref(), *limit).await
            }
            Some(Commands::Optimize { build_id }) => {
                print_banner();
                Self::execute_optimize(config, *build_id).await
            }
            Some(Commands::Tools) => {
                print_banner();
                print_tool_catalog(&tool_catalog());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["travis-lens"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_insights_arguments() {
        let cli = Cli::try_parse_from([
            "travis-lens",
            "insights",
            "--repo",
            "owner/repo",
            "--branch",
            "main",
            "--limit",
            "20",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Insights {
                repo,
                branch,
                limit,
            }) => {
                assert_eq!(repo, "owner/repo");
                assert_eq!(branch.as_deref(), Some("main"));
                assert_eq!(limit, Some(20));
            }
            _ => panic!("expected insights command"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "travis-lens",
            "optimize",
            "--build-id",
            "42",
            "--url",
            "https://travis.example.com/api",
        ])
        .unwrap();

        assert_eq!(cli.url.as_deref(), Some("https://travis.example.com/api"));
        assert!(matches!(cli.command, Some(Commands::Optimize { build_id: 42 })));
    }

    #[test]
    fn test_optimize_requires_build_id() {
        assert!(Cli::try_parse_from(["travis-lens", "optimize"]).is_err());
    }

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
