// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use leadbook_app::{Completion, Effect, LeadApi, perform};
use leadbook_tui::InternalEvent;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;
use tracing::debug;

/// Runs each effect on its own worker thread so slow requests never block
/// input handling. Completions come back through the event channel.
pub struct ThreadRuntime<A> {
    api: Arc<A>,
}

impl<A> ThreadRuntime<A> {
    pub fn new(api: A) -> Self {
        Self { api: Arc::new(api) }
    }
}

impl<A: LeadApi + Send + Sync + 'static> leadbook_tui::AppRuntime for ThreadRuntime<A> {
    fn perform(&mut self, effect: Effect) -> Completion {
        perform(self.api.as_ref(), effect)
    }

    fn spawn_effect(&mut self, effect: Effect, tx: Sender<InternalEvent>) -> Result<()> {
        let api = Arc::clone(&self.api);
        debug!(?effect, "spawn request");
        thread::Builder::new()
            .name("leadbook-request".to_owned())
            .spawn(move || {
                let completion = perform(api.as_ref(), effect);
                // Receiver is gone once the app is shutting down.
                let _ = tx.send(InternalEvent::Completed(completion));
            })
            .context("spawn request thread")?;
        Ok(())
    }
}
