// crates/annex-daemon/src/actor.rs
//
// FlywheelActor: the single writer.
//
// The comptroller lives inside one tokio task. Every mutation arrives as a
// command on an mpsc channel and is answered on a oneshot, so transactions
// are applied strictly one at a time in arrival order. A transaction only
// becomes visible after its receipt and the resulting snapshot are
// persisted; if the store fails the in-memory state stays where it was.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use annex_core::{AnnexError, BlockNumber};
use annex_flywheel::{
    Comptroller, EmissionTotals, Exp, FlywheelError, GenesisConfig, LedgerSnapshot, Transaction,
};
use annex_store::{FlywheelStore, StoredReceipt};

use crate::events::FlywheelNotice;

#[derive(Debug, Error)]
pub enum ActorError {
    #[error(transparent)]
    Rejected(#[from] FlywheelError),

    #[error(transparent)]
    Store(#[from] AnnexError),

    #[error("flywheel actor is not running")]
    Closed,
}

impl ActorError {
    pub fn code(&self) -> &'static str {
        match self {
            ActorError::Rejected(e) => e.code(),
            ActorError::Store(_) => "storage",
            ActorError::Closed => "closed",
        }
    }
}

/// Point-in-time summary of the actor's state.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub height: BlockNumber,
    pub digest: String,
    pub emission_rate: Exp,
    pub totals: EmissionTotals,
    pub committed: u64,
    pub rejected: u64,
    pub started_at: DateTime<Utc>,
}

enum Command {
    Apply {
        height: BlockNumber,
        tx: Transaction,
        reply: oneshot::Sender<Result<StoredReceipt, ActorError>>,
    },
    Snapshot {
        reply: oneshot::Sender<LedgerSnapshot>,
    },
    Status {
        reply: oneshot::Sender<Result<Status, ActorError>>,
    },
}

/// Cloneable sender side of the actor.
#[derive(Clone)]
pub struct FlywheelHandle {
    commands: mpsc::Sender<Command>,
}

impl FlywheelHandle {
    pub async fn apply(
        &self,
        height: BlockNumber,
        tx: Transaction,
    ) -> Result<StoredReceipt, ActorError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Apply { height, tx, reply })
            .await
            .map_err(|_| ActorError::Closed)?;
        rx.await.map_err(|_| ActorError::Closed)?
    }

    pub async fn snapshot(&self) -> Result<LedgerSnapshot, ActorError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| ActorError::Closed)?;
        rx.await.map_err(|_| ActorError::Closed)
    }

    pub async fn status(&self) -> Result<Status, ActorError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Status { reply })
            .await
            .map_err(|_| ActorError::Closed)?;
        rx.await.map_err(|_| ActorError::Closed)?
    }
}

pub struct FlywheelActor {
    comptroller: Comptroller,
    store: Arc<dyn FlywheelStore>,
    notices: broadcast::Sender<FlywheelNotice>,
    commands: mpsc::Receiver<Command>,
    committed: u64,
    rejected: u64,
    started_at: DateTime<Utc>,
}

impl FlywheelActor {
    /// Start the actor task. It stops once every handle is dropped.
    pub fn spawn(
        comptroller: Comptroller,
        store: Arc<dyn FlywheelStore>,
        notices: broadcast::Sender<FlywheelNotice>,
        queue_depth: usize,
    ) -> (FlywheelHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let actor = Self {
            comptroller,
            store,
            notices,
            commands: rx,
            committed: 0,
            rejected: 0,
            started_at: Utc::now(),
        };
        let task = tokio::spawn(actor.run());
        (FlywheelHandle { commands: tx }, task)
    }

    async fn run(mut self) {
        info!(height = self.comptroller.height(), "flywheel actor started");
        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Apply { height, tx, reply } => {
                    let result = self.apply(height, tx).await;
                    let _ = reply.send(result);
                }
                Command::Snapshot { reply } => {
                    let _ = reply.send(LedgerSnapshot::capture(&self.comptroller));
                }
                Command::Status { reply } => {
                    let _ = reply.send(self.status());
                }
            }
        }
        info!(
            height = self.comptroller.height(),
            committed = self.committed,
            rejected = self.rejected,
            "flywheel actor stopped"
        );
    }

    async fn apply(
        &mut self,
        height: BlockNumber,
        tx: Transaction,
    ) -> Result<StoredReceipt, ActorError> {
        let op = tx.op();
        let mut next = self.comptroller.clone();
        let receipt = match next.apply(height, tx) {
            Ok(receipt) => receipt,
            Err(e) => {
                self.rejected += 1;
                let _ = self.notices.send(FlywheelNotice::Rejected {
                    block: height,
                    op: op.to_string(),
                    code: e.code().to_string(),
                    message: e.to_string(),
                });
                return Err(e.into());
            }
        };

        let snapshot = LedgerSnapshot::capture(&next);
        let stored = match self.store.commit(&receipt, &snapshot).await {
            Ok(stored) => stored,
            Err(e) => {
                error!(op, block = height, error = %e, "failed to persist transaction");
                return Err(e.into());
            }
        };

        self.comptroller = next;
        self.committed += 1;
        // Sending only fails when nobody is subscribed.
        let _ = self.notices.send(FlywheelNotice::Committed {
            seq: stored.seq,
            block: stored.block,
            op: stored.op.clone(),
            events: stored.events.clone(),
        });
        Ok(stored)
    }

    fn status(&self) -> Result<Status, ActorError> {
        Ok(Status {
            height: self.comptroller.height(),
            digest: LedgerSnapshot::capture(&self.comptroller).digest()?,
            emission_rate: self.comptroller.config().emission_rate(),
            totals: self.comptroller.totals(),
            committed: self.committed,
            rejected: self.rejected,
            started_at: self.started_at,
        })
    }
}

/// Resume from the stored snapshot, or start a fresh comptroller.
pub async fn load_or_genesis(
    store: &dyn FlywheelStore,
    genesis: GenesisConfig,
) -> Result<Comptroller, ActorError> {
    match store.load_snapshot().await? {
        Some(snapshot) => {
            info!(height = snapshot.height(), "resuming from stored snapshot");
            Ok(snapshot.restore())
        }
        None => {
            warn!(start_block = genesis.start_block, "no snapshot found, starting from genesis");
            Ok(Comptroller::genesis(genesis)?)
        }
    }
}
