// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Thread groups.

use std::fmt;
use std::io;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use log::{error, info};

////////////////////////////////////////////////////////////////////////
// THREAD GROUPS                                                      //
////////////////////////////////////////////////////////////////////////

/// A group of named threads that are shut down together.
///
/// Threads are either one-shot ([`ThreadGroup::start_oneshot`]), which
/// run their task once, or respawnable
/// ([`ThreadGroup::start_respawnable`]), which are restarted whenever
/// their task returns or panics while the group is still running.
///
/// [`ThreadGroup::shut_down`] stops new threads from starting and stops
/// respawns. It does not interrupt running tasks: long-running tasks
/// should hold an [`Arc`] to the group and poll
/// [`ThreadGroup::is_shutting_down`]. [`ThreadGroup::await_shutdown`]
/// blocks until every thread of the group has exited.
pub struct ThreadGroup {
    state: Mutex<GroupState>,

    /// Signaled when shutdown begins and when the last thread exits
    /// during shutdown. Used with the `state` mutex.
    wakeup: Condvar,
}

#[derive(Default)]
struct GroupState {
    live_threads: usize,
    shutting_down: bool,
}

impl ThreadGroup {
    /// Creates a new thread group.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(GroupState::default()),
            wakeup: Condvar::new(),
        })
    }

    /// Starts a thread that runs `task` once. It is not restarted, even
    /// if it panics.
    pub fn start_oneshot<F>(self: &Arc<Self>, name: impl Into<String>, task: F) -> Result<(), Error>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.state.lock().unwrap();
        if state.shutting_down {
            return Err(Error::ShuttingDown);
        }
        spawn_member(self, &mut state, name.into(), Restart::Never, task)?;
        Ok(())
    }

    /// Starts a thread that runs `task`, and runs it again on a fresh
    /// thread whenever it returns or panics before the group shuts
    /// down. Restarts are spaced at least [`RESPAWN_DELAY`] apart.
    pub fn start_respawnable<F>(
        self: &Arc<Self>,
        name: impl Into<String>,
        task: F,
    ) -> Result<(), Error>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut state = self.state.lock().unwrap();
        if state.shutting_down {
            return Err(Error::ShuttingDown);
        }
        let task: Arc<dyn Fn() + Send + Sync> = Arc::new(task);
        spawn_respawnable(self, &mut state, name.into(), task)?;
        Ok(())
    }

    /// Begins shutting down the group.
    pub fn shut_down(&self) {
        let mut state = self.state.lock().unwrap();
        state.shutting_down = true;
        self.wakeup.notify_all();
    }

    /// Waits until shutdown has begun and every thread of the group has
    /// exited. Calling this from a thread of the group deadlocks.
    pub fn await_shutdown(&self) {
        let state = self.state.lock().unwrap();
        let _state = self
            .wakeup
            .wait_while(state, |s| !s.shutting_down || s.live_threads > 0)
            .unwrap();
    }

    /// Returns whether the group is shutting down.
    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().unwrap().shutting_down
    }

    /// Returns the number of threads of the group that are running.
    pub fn live_threads(&self) -> usize {
        self.state.lock().unwrap().live_threads
    }
}

/// The minimum time between two starts of a respawnable thread, so that
/// a task that fails immediately does not spin.
pub const RESPAWN_DELAY: Duration = Duration::from_secs(1);

/// What happens when a member thread's task ends.
enum Restart {
    Never,
    Respawn {
        task: Arc<dyn Fn() + Send + Sync>,
        started: Instant,
    },
}

/// Owned by each member thread. Dropping it (when the task returns or
/// unwinds) does the group's bookkeeping and any respawn.
struct Membership {
    group: Arc<ThreadGroup>,
    spawner: ThreadId,
    restart: Restart,
}

fn spawn_respawnable(
    group: &Arc<ThreadGroup>,
    state: &mut GroupState,
    name: String,
    task: Arc<dyn Fn() + Send + Sync>,
) -> io::Result<()> {
    let restart = Restart::Respawn {
        task: task.clone(),
        started: Instant::now(),
    };
    spawn_member(group, state, name, restart, move || (*task)())
}

fn spawn_member<B>(
    group: &Arc<ThreadGroup>,
    state: &mut GroupState,
    name: String,
    restart: Restart,
    body: B,
) -> io::Result<()>
where
    B: FnOnce() + Send + 'static,
{
    state.live_threads += 1;
    let membership = Membership {
        group: group.clone(),
        spawner: thread::current().id(),
        restart,
    };
    let result = thread::Builder::new().name(name).spawn(move || {
        body();
        drop(membership);
    });
    if result.is_err() {
        state.live_threads -= 1;
    }
    result.map(drop)
}

impl Drop for Membership {
    fn drop(&mut self) {
        let current = thread::current();

        // Dropped on the spawning thread: the OS thread never started,
        // and spawn_member has already undone the count.
        if current.id() == self.spawner {
            return;
        }

        let name = current.name().unwrap_or("anonymous");
        if thread::panicking() {
            error!("Thread {} panicked", name);
        }

        let mut state = self.group.state.lock().unwrap();
        if let Restart::Respawn { task, started } = &self.restart {
            if !state.shutting_down {
                if !thread::panicking() {
                    error!("Respawnable thread {} exited prematurely", name);
                }

                // The wait is cut short if shutdown begins.
                let running_for = started.elapsed();
                if running_for < RESPAWN_DELAY {
                    let wait_for = RESPAWN_DELAY - running_for;
                    info!(
                        "Respawn of thread {} throttled: delayed by {} ms",
                        name,
                        wait_for.as_millis()
                    );
                    state = self.group.wakeup.wait_timeout(state, wait_for).unwrap().0;
                }

                if !state.shutting_down {
                    let result =
                        spawn_respawnable(&self.group, &mut state, name.to_owned(), task.clone());
                    if let Err(e) = result {
                        error!("Respawn of thread {} failed: {}", name, e);
                    }
                }
            }
        }

        state.live_threads -= 1;
        if state.shutting_down && state.live_threads == 0 {
            self.group.wakeup.notify_all();
        }
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that a thread could not be started.
#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    ShuttingDown,
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(err) => err.fmt(f),
            Self::ShuttingDown => f.write_str("thread group is shutting down"),
        }
    }
}

impl std::error::Error for Error {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
