// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A [`SystemTimer`] backed by a worker thread.
//!
//! The worker sleeps until the armed deadline or the next command, whichever
//! comes first. Arming and cancelling only send a command, so they never
//! block the caller, even while the expiry callback runs.

use crossbeam_channel::{RecvTimeoutError, Sender};
use nanohub_core::pal::{SystemTimer, TimerCallback};
use std::thread;
use std::time::{Duration, Instant};

enum TimerCommand {
    Arm(Instant),
    Disarm,
    Shutdown,
}

/// One-shot system timer running its callback on a dedicated thread.
#[derive(Default)]
pub struct StdSystemTimer {
    commands: Option<Sender<TimerCommand>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl StdSystemTimer {
    /// Creates an uninitialized timer.
    pub fn new() -> Self {
        Self::default()
    }

    fn send(&self, command: TimerCommand) -> bool {
        match &self.commands {
            Some(commands) => commands.send(command).is_ok(),
            None => {
                log::warn!("StdSystemTimer: Used before init");
                false
            }
        }
    }
}

fn run_worker(commands: crossbeam_channel::Receiver<TimerCommand>, callback: TimerCallback) {
    let mut deadline: Option<Instant> = None;
    loop {
        let command = match deadline {
            Some(at) => match commands.recv_deadline(at) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            },
        };
        match command {
            Some(TimerCommand::Arm(at)) => deadline = Some(at),
            Some(TimerCommand::Disarm) => deadline = None,
            Some(TimerCommand::Shutdown) => break,
            None => {
                deadline = None;
                callback();
            }
        }
    }
    log::debug!("StdSystemTimer: Worker exited.");
}

impl SystemTimer for StdSystemTimer {
    fn init(&mut self, callback: TimerCallback) -> bool {
        if self.commands.is_some() {
            log::warn!("StdSystemTimer: Already initialized");
            return false;
        }
        let (tx, rx) = crossbeam_channel::unbounded();
        let spawned = thread::Builder::new()
            .name("nanohub-timer".into())
            .spawn(move || run_worker(rx, callback));
        match spawned {
            Ok(worker) => {
                self.commands = Some(tx);
                self.worker = Some(worker);
                true
            }
            Err(err) => {
                log::error!("StdSystemTimer: Failed to spawn the worker: {err}");
                false
            }
        }
    }

    fn set(&mut self, delay: Duration) -> bool {
        self.send(TimerCommand::Arm(Instant::now() + delay))
    }

    fn cancel(&mut self) -> bool {
        self.send(TimerCommand::Disarm)
    }
}

impl Drop for StdSystemTimer {
    fn drop(&mut self) {
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(TimerCommand::Shutdown);
        }
        if let Some(worker) = self.worker.take() {
            // The last owner may be the expiry callback itself.
            if worker.thread().id() != thread::current().id() && worker.join().is_err() {
                log::error!("StdSystemTimer: Worker panicked");
            }
        }
    }
}
