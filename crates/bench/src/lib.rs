pub mod aws;
pub mod benchmark;
pub mod config;
pub mod credentials;
pub mod dataset;
pub mod deploy;
pub mod loadtool;
pub mod plots;
pub mod report;

pub use aws::AwsCli;
pub use benchmark::{BenchmarkRecord, BenchmarkResults, Benchmarker, InstanceSummary};
pub use config::BenchmarkConfig;
pub use credentials::{AwsCliCredentials, CredentialSource, SessionCredentials, StaticCredentials};
pub use dataset::{DatasetConfig, prepare_dataset};
pub use deploy::{
    AwsCliDeployer, Deployment, DeploymentConfig, Endpoint, EndpointDeployer, deploy_all, finish, teardown,
};
pub use loadtool::{LoadTool, LoadToolConfig};
pub use plots::generate_plots;
pub use report::{extract_metric, parse_report};
