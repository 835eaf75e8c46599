// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! Resolves once the process is asked to stop (SIGINT/SIGTERM, or Ctrl-C off
//! unix). If the handler cannot be registered the future never resolves and
//! a warning is logged, so a dispatcher keeps serving instead of stopping.

pub async fn shutdown() {
    imp::shutdown().await
}

#[cfg(unix)]
mod imp {
    use tokio::signal::unix::{SignalKind, signal};
    use tracing::{info, warn};

    pub(super) async fn shutdown() {
        tokio::select! {
            // interrupt from a terminal
            _ = sig(SignalKind::interrupt(), "SIGINT") => {}
            // e.g. a container runtime stopping the dispatcher
            _ = sig(SignalKind::terminate(), "SIGTERM") => {}
        };
    }

    async fn sig(kind: SignalKind, name: &str) {
        match signal(kind) {
            Ok(mut stream) => {
                stream.recv().await;
                info!(
                    target: "botrpc::signal",
                    "received signal {}, starting shutdown",
                    name,
                );
            }
            Err(e) => {
                warn!(target: "botrpc::signal", error = %e, "failed to register {} handler", name);
                std::future::pending::<()>().await
            }
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use tracing::{info, warn};

    pub(super) async fn shutdown() {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!(
                target: "botrpc::signal",
                "received signal Ctrl-C, starting shutdown",
            ),
            Err(e) => {
                warn!(target: "botrpc::signal", error = %e, "failed to register Ctrl-C handler");
                std::future::pending::<()>().await
            }
        }
    }
}
