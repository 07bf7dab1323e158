use std::io::Write;

use clap::ValueEnum;
use prettytable::{row, Table};
use serde::Deserialize;
use thiserror::Error;

use crate::report::ClusterCapacityReview;

#[derive(Debug, Default, Clone, Copy, Deserialize, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable summary
    #[default]
    Pretty,
    Json,
    Yaml,
}

#[derive(Debug, Error)]
pub enum PrintError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub fn print_review(
    review: &ClusterCapacityReview,
    format: OutputFormat,
    verbose: bool,
    out: &mut dyn Write,
) -> Result<(), PrintError> {
    match format {
        OutputFormat::Pretty => print_review_pretty(review, verbose, out),
        OutputFormat::Json => {
            let serialized_json = serde_json::to_string_pretty(review)?;
            writeln!(out, "{}", serialized_json)?;
            Ok(())
        }
        OutputFormat::Yaml => {
            out.write_all(serde_yaml::to_string(review)?.as_bytes())?;
            Ok(())
        }
    }
}

pub fn print_review_pretty(
    review: &ClusterCapacityReview,
    verbose: bool,
    out: &mut dyn Write,
) -> Result<(), PrintError> {
    if verbose {
        for requirements in review.spec.pod_requirements.iter() {
            writeln!(out, "{} pod requirements:", requirements.pod_name)?;
            writeln!(out, "\t- CPU: {}m", requirements.resources.cpu)?;
            writeln!(out, "\t- Memory: {}", requirements.resources.memory)?;
            if !requirements.node_selectors.is_empty() {
                let selector: Vec<String> = requirements
                    .node_selectors
                    .iter()
                    .map(|(key, value)| format!("{}={}", key, value))
                    .collect();
                writeln!(out, "\t- NodeSelector: {}", selector.join(","))?;
            }
            writeln!(out)?;
        }
    }

    for pod in review.status.pods.iter() {
        if verbose {
            writeln!(
                out,
                "The cluster can schedule {} instance(s) of the pod {}.",
                pod.instances(),
                pod.pod_name
            )?;
        } else {
            writeln!(out, "{}", pod.instances())?;
        }
    }

    if !verbose {
        return Ok(());
    }

    if let Some(fail_reason) = &review.status.fail_reason {
        writeln!(
            out,
            "\nTermination reason: {}: {}",
            fail_reason.fail_type, fail_reason.fail_message
        )?;
    }

    if review.status.replicas > 0 {
        for pod in review.status.pods.iter() {
            if pod.replicas_on_nodes.is_empty() {
                continue;
            }
            writeln!(out, "\nPod distribution among nodes:")?;
            writeln!(out, "{}", pod.pod_name)?;
            let mut distribution_table = Table::new();
            distribution_table.add_row(row!["Node", "Instances"]);
            for replicas in pod.replicas_on_nodes.iter() {
                distribution_table.add_row(row![replicas.node_name, replicas.replicas]);
            }
            write!(out, "{}", distribution_table)?;
        }
    }

    if let Some(latency) = &review.status.scheduling_latency {
        let mut stats_table = Table::new();
        stats_table.add_row(row!["Metric", "Min", "Max", "Mean", "Variance"]);
        stats_table.add_row(row![
            "Pod scheduling latency (s)",
            latency.min,
            latency.max,
            latency.mean,
            latency.variance
        ]);
        write!(out, "\n{}", stats_table)?;
    }
    Ok(())
}
