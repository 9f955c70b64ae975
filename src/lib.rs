//! Pavectl - operational tooling for the pave AWS infrastructure.
//!
//! Pavectl collects the day-to-day workflows around a small Terraform-managed
//! AWS deployment into one CLI: standing up the bootstrap IAM identity,
//! extracting credentials, detecting drift, rotating compromised keys,
//! migrating Terraform state, and tearing everything back down.
//!
//! # Features
//!
//! - **Bootstrap lifecycle**: Create, verify, repair, and destroy the
//!   bootstrap user, policy, role, state bucket, and stored credentials
//! - **Async AWS SDK**: All AWS calls go through the official SDK on tokio
//! - **Safe teardown**: Deletion candidates are pattern-matched and the
//!   bootstrap identity is always excluded
//! - **Drift detection**: Deployed IAM resources are compared against the
//!   expected Terraform model
//! - **Secret hygiene**: Credential files are written with mode 600 and
//!   secrets never reach the console outside the bootstrap echo
//!
//! # Quick Start
//!
//! ```no_run
//! use pavectl::{ops, Config, Reporter};
//!
//! #[tokio::main]
//! async fn main() -> pavectl::Result<()> {
//!     let config = Config::new().with_region("us-east-1");
//!     let reporter = Reporter::new(true);
//!
//!     let code = ops::validate::run(&config, &reporter).await?;
//!     std::process::exit(code);
//! }
//! ```
//!
//! # Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `bootstrap create` | Create the bootstrap user, policy, role, state bucket, and secret |
//! | `bootstrap destroy` | Remove every bootstrap resource |
//! | `bootstrap check` | Verify the bootstrap credentials and permissions |
//! | `bootstrap fix-s3` | Republish the Terraform policy with S3 state permissions |
//! | `cleanup` | Delete deployment IAM users, roles, policies, and buckets |
//! | `drift` | Compare deployed IAM resources against the expected configuration |
//! | `rotate-keys` | Rotate a compromised access key |
//! | `credentials` | Write local credential files for the deployment users |
//! | `status` | Show local and AWS deployment status |
//! | `validate` | Check AWS credentials and local tooling |
//! | `backend` | Switch the Terraform backend between local and S3 |
//! | `migrate-state` | Move local Terraform state into S3 |
//! | `github-setup` | Print GitHub Actions secret configuration steps |
//! | `health` | Check that deployed infrastructure responds |
//! | `scan` | Scan the working tree for security issues |
//! | `lint` | Lint Markdown and YAML files |

pub mod error;
pub mod config;
pub mod report;
pub mod retry;
pub mod exec;
pub mod credfile;
pub mod policy;
pub mod terraform;
pub mod aws;
pub mod cli;
pub mod ops;

pub use config::Config;
pub use error::{PaveError, Result};
pub use report::Reporter;
