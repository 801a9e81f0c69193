// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Nereid and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::io;

use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
#[error("failed to open viewer at {url}")]
pub struct LaunchError {
    pub url: String,
    #[source]
    pub source: io::Error,
}

/// Brings a viewer for `url` to the front, starting one if needed.
pub trait ViewerLauncher: Send + Sync + 'static {
    fn open(&self, url: &str) -> Result<(), LaunchError>;
}

/// Opens the URL in the user's default browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl ViewerLauncher for SystemLauncher {
    fn open(&self, url: &str) -> Result<(), LaunchError> {
        match webbrowser::open(url) {
            Ok(()) => {
                info!(url, "viewer launched");
                Ok(())
            }
            Err(source) => {
                warn!(url, error = %source, "viewer launch failed");
                Err(LaunchError {
                    url: url.to_owned(),
                    source,
                })
            }
        }
    }
}

/// Launcher that only records the URLs it was asked to open.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingLauncher {
    opened: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
}

#[cfg(test)]
impl RecordingLauncher {
    pub(crate) fn opened(&self) -> Vec<String> {
        self.opened.lock().expect("launcher lock").clone()
    }
}

#[cfg(test)]
impl ViewerLauncher for RecordingLauncher {
    fn open(&self, url: &str) -> Result<(), LaunchError> {
        self.opened.lock().expect("launcher lock").push(url.to_owned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_launcher_keeps_every_request() {
        let launcher = RecordingLauncher::default();
        let shared = launcher.clone();
        launcher.open("http://127.0.0.1:1/").expect("open");
        shared.open("http://127.0.0.1:2/").expect("open");
        assert_eq!(
            launcher.opened(),
            vec!["http://127.0.0.1:1/".to_owned(), "http://127.0.0.1:2/".to_owned()]
        );
    }

    #[test]
    fn launch_error_names_the_url() {
        let err = LaunchError {
            url: "http://127.0.0.1:9/".to_owned(),
            source: io::Error::new(io::ErrorKind::NotFound, "no browser"),
        };
        assert_eq!(err.to_string(), "failed to open viewer at http://127.0.0.1:9/");
        assert!(std::error::Error::source(&err).is_some());
    }
}
