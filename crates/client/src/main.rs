use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use scaled_proto::{
    QueueStatus, ScaleFactorResponse, ScreenScaleFactors, ScreenScaleFactorsResponse, SetScaleFactorRequest,
    SetScreenScaleFactorsRequest,
};
use serde::{de::DeserializeOwned, Serialize};

#[derive(Parser)]
/// Command-line client for the scaled display scale daemon.
struct Opts {
    /// Daemon URL
    #[arg(long, default_value = "http://127.0.0.1:7878")]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Set one scale factor for every monitor
    Set {
        scale: f64,

        /// don't emit started/done signals for this change
        #[arg(long)]
        silent: bool,
    },
    /// Set per-monitor factors, e.g. `eDP-1=2 HDMI-1=1 ALL=1.5`
    SetScreens {
        #[arg(value_name = "NAME=FACTOR", required = true, value_parser = parse_factor)]
        factors: Vec<(String, f64)>,
    },
    /// Print the current single scale factor
    Get,
    /// Print the per-monitor factors
    GetScreens,
    /// Print the boot-splash queue status
    Status,
}

fn parse_factor(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s.split_once('=').ok_or_else(|| format!("expected NAME=FACTOR, got {}", s))?;
    if name.is_empty() {
        return Err(format!("missing monitor name in {}", s));
    }
    let value = value.parse::<f64>().map_err(|e| format!("invalid factor in {}: {}", s, e))?;
    Ok((name.to_string(), value))
}

async fn post_json<T: Serialize>(client: &reqwest::Client, url: &str, body: &T) -> anyhow::Result<()> {
    let resp = client.post(url).json(body).send().await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.bytes().await.unwrap_or_default();
        return Err(anyhow!("{} failed: {} - {}", url, status, String::from_utf8_lossy(&body)));
    }
    Ok(())
}

async fn get_json<T: DeserializeOwned>(client: &reqwest::Client, url: &str) -> anyhow::Result<T> {
    let resp = client.get(url).send().await?;

    let status = resp.status();
    let body = resp.bytes().await.unwrap_or_default();
    if !status.is_success() {
        return Err(anyhow!("{} failed: {} - {}", url, status, String::from_utf8_lossy(&body)));
    }
    serde_json::from_slice(&body).with_context(|| format!("unexpected response from {}", url))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    let server = opts.server.trim_end_matches('/');
    let client = reqwest::Client::new();

    match opts.command {
        Command::Set { scale, silent } => {
            let path = if silent { "scale_factor_silent" } else { "scale_factor" };
            post_json(&client, &format!("{}/{}", server, path), &SetScaleFactorRequest { scale }).await?;
            println!("scale factor set to {:.2}", scale);
        }
        Command::SetScreens { factors } => {
            let factors: ScreenScaleFactors = factors.into_iter().collect();
            let req = SetScreenScaleFactorsRequest { factors };
            post_json(&client, &format!("{}/screen_scale_factors", server), &req).await?;
            println!("screen scale factors set");
        }
        Command::Get => {
            let resp: ScaleFactorResponse = get_json(&client, &format!("{}/scale_factor", server)).await?;
            println!("{:.2}", resp.scale);
        }
        Command::GetScreens => {
            let resp: ScreenScaleFactorsResponse =
                get_json(&client, &format!("{}/screen_scale_factors", server)).await?;
            for (name, factor) in resp.factors {
                println!("{}={:.2}", name, factor);
            }
        }
        Command::Status => {
            let status: QueueStatus = get_json(&client, &format!("{}/status", server)).await?;
            let pending = status.pending.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
            println!("active: {}\npending: {}\nsuperseded: {}", status.active, pending, status.superseded);
        }
    }

    Ok(())
}
