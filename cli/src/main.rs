#![warn(clippy::nursery, clippy::pedantic)]
#![deny(unsafe_code)]

// Fleeting CLI Client
// Copyright (C) 2021  Edward Shen
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use atty::Stream;
use clap::{Parser, Subcommand};
use fleeting_common::{
    Availability, CreatePaste, CreatedPaste, ErrorBody, PasteView, UnavailableBody, Url,
    PASTES_PATH,
};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;

use crate::target::Target;

mod target;

#[derive(Parser)]
#[command(version, about)]
struct Opts {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Upload text and print its share link.
    Create {
        /// The Fleeting instance to upload to.
        server: Url,
        /// Seconds until the paste expires.
        #[arg(short, long)]
        ttl: Option<i64>,
        /// Number of views before the paste is gone.
        #[arg(short, long)]
        max_views: Option<i64>,
        /// File to upload. Reads stdin when omitted.
        path: Option<PathBuf>,
    },
    /// Print a paste. This uses up one of its views.
    View {
        /// Share link, or a bare id together with --server.
        paste: String,
        #[arg(long)]
        server: Option<Url>,
    },
    /// Tell whether a paste can still be viewed, without viewing it.
    Check {
        /// Share link, or a bare id together with --server.
        paste: String,
        #[arg(long)]
        server: Option<Url>,
    },
}

fn main() -> Result<()> {
    let opts = Opts::parse();

    match opts.action {
        Action::Create {
            server,
            ttl,
            max_views,
            path,
        } => handle_create(&server, ttl, max_views, path),
        Action::View { paste, server } => handle_view(&Target::resolve(&paste, server)?),
        Action::Check { paste, server } => handle_check(&Target::resolve(&paste, server)?),
    }?;

    Ok(())
}

fn handle_create(
    server: &Url,
    ttl: Option<i64>,
    max_views: Option<i64>,
    path: Option<PathBuf>,
) -> Result<()> {
    let data = if let Some(path) = path {
        std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?
    } else {
        if atty::is(Stream::Stdin) {
            bail!("Nothing to upload. Pass a file or pipe text on stdin.");
        }
        let mut data = Vec::new();
        std::io::stdin().read_to_end(&mut data)?;
        data
    };

    let content = String::from_utf8(data).context("Pastes must be UTF-8 text")?;
    let request = CreatePaste {
        content,
        ttl_seconds: ttl,
        max_views,
    };

    let res = Client::new()
        .post(server.join(PASTES_PATH)?)
        .json(&request)
        .send()
        .context("Request to server failed")?;

    if res.status() != StatusCode::CREATED {
        bail!("Upload failed: {}", describe_error(res));
    }

    let created: CreatedPaste = res.json().context("Unexpected response from server")?;
    println!("{}", created.url);

    Ok(())
}

fn handle_view(target: &Target) -> Result<()> {
    let res = Client::new()
        .get(target.api_url()?)
        .send()
        .context("Failed to get paste")?;

    if res.status() != StatusCode::OK {
        bail!("{}", describe_error(res));
    }

    let view: PasteView = res.json().context("Unexpected response from server")?;

    std::io::stdout().write_all(view.content.as_bytes())?;
    if atty::is(Stream::Stdout) && !view.content.ends_with('\n') {
        println!();
    }

    let views_text = view.remaining_views.map_or_else(
        || "No view limit.".to_string(),
        |n| format!("{n} view(s) left."),
    );
    let expiry_text = view.expires_at.map_or_else(
        || "This paste will not expire.".to_string(),
        |at| at.format("This paste expires on %A, %B %-d, %Y at %T %Z.").to_string(),
    );
    eprintln!("{views_text} {expiry_text}");

    Ok(())
}

fn handle_check(target: &Target) -> Result<()> {
    let res = Client::new()
        .get(target.availability_url()?)
        .send()
        .context("Failed to check paste")?;

    if res.status() != StatusCode::OK {
        bail!("{}", describe_error(res));
    }

    let availability: Availability = res.json().context("Unexpected response from server")?;
    if availability.available {
        match availability.remaining_views {
            Some(n) => println!("available, {n} view(s) left"),
            None => println!("available"),
        }
    } else {
        println!("unavailable");
    }

    Ok(())
}

/// Best-effort rendering of a non-success response.
fn describe_error(res: Response) -> String {
    let status = res.status();
    let text = match res.text() {
        Ok(text) => text,
        Err(_) => return format!("HTTP error {status}"),
    };

    if status == StatusCode::NOT_FOUND {
        if let Ok(body) = serde_json::from_str::<UnavailableBody>(&text) {
            return format!("{} ({})", body.error, body.message);
        }
    }

    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => format!("{} ({})", body.error, body.message),
        Err(_) => format!("HTTP error {status}"),
    }
}
