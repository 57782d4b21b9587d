//! Cooperative round-robin scheduling of routines.
//!
//! A routine is an execution context plus an ordered value list and a
//! cursor. The scheduler advances one routine by one instruction per
//! tick, removes finished routines, and isolates errors: a failing
//! routine is reported to stderr, terminated, and the rest keep
//! running.
use std::rc::Rc;

use crate::interpreter;
use crate::value::Value;
use crate::{Context, Error, Runtime};

/// One lightweight execution thread: a context, its instruction list,
/// and a cursor. `offset == len + 1` marks terminated-by-error, which
/// counts as finished.
pub struct Routine {
    context: Context,
    values: Vec<Value>,
    offset: usize,
}

impl Routine {
    pub fn new(context: Context, values: Vec<Value>) -> Self {
        Self {
            context,
            values,
            offset: 0,
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Advance by one instruction. Returns `false` when the step
    /// raised; the routine is left terminated.
    pub fn step(&mut self, rt: &Rc<Runtime>) -> bool {
        if self.offset < self.values.len() {
            let value = self.values[self.offset].clone();
            if !interpreter::execute(rt, &mut self.context, &value) {
                self.offset = self.values.len() + 1;
                return false;
            }
            self.offset += 1;
        }
        true
    }

    pub fn is_finished(&self) -> bool {
        self.offset >= self.values.len()
    }
}

/// Round-robin scheduler over a list of routines.
pub struct Scheduler {
    runtime: Rc<Runtime>,
    routines: Vec<Routine>,
    offset: usize,
}

impl Scheduler {
    pub fn new(runtime: Rc<Runtime>) -> Self {
        Self {
            runtime,
            routines: Vec::new(),
            offset: 0,
        }
    }

    pub fn runtime(&self) -> &Rc<Runtime> {
        &self.runtime
    }

    /// Append a routine with a fresh context sharing the runtime.
    pub fn spawn(&mut self, values: Vec<Value>) {
        tracing::trace!(instructions = values.len(), "spawn routine");
        self.routines.push(Routine::new(Context::new(), values));
    }

    pub fn is_finished(&self) -> bool {
        self.routines.iter().all(Routine::is_finished)
    }

    /// One scheduler tick: advance the routine under the cursor by one
    /// instruction, report and clear its error if the step failed,
    /// remove it if finished. Returns whether an error was observed
    /// this tick.
    pub fn step(&mut self) -> bool {
        if self.offset >= self.routines.len() {
            self.offset = 0;
            return false;
        }

        let runtime = Rc::clone(&self.runtime);
        let routine = &mut self.routines[self.offset];
        let mut error_occurred = false;

        if !routine.step(&runtime) {
            error_occurred = true;
            match routine.context.error.take() {
                Some(error) => report(&error),
                None => eprintln!("Unknown error."),
            }
        }

        if self.routines[self.offset].is_finished() {
            // Survivors shift left; the cursor now points at the next
            // routine already.
            self.routines.remove(self.offset);
        } else {
            self.offset += 1;
        }

        error_occurred
    }
}

fn report(error: &Error) {
    match &error.position {
        Some(position) => {
            eprintln!("Error: {position}:{} - {}", error.code, error.message);
        }
        None => eprintln!("Error: {} - {}", error.code, error.message),
    }
}
