//! The VM's trace hook (spec §4.7 "Statement tracing", §6 "Optional ...
//! trace callback"). Grounded in the teacher's `tracer` module: a small
//! event enum plus a trait every embedder-supplied tracer implements, with
//! a no-op default and a couple of ready-made implementations.

use crate::loc::CodeLoc;

#[derive(Debug, Clone)]
pub enum TraceEvent<'a> {
    Statement { loc: &'a CodeLoc },
    Call { callee: &'a str, loc: &'a CodeLoc },
    Return { loc: &'a CodeLoc },
    Throw { loc: &'a CodeLoc },
}

/// Fired at each `SEE_TRACE_STATEMENT`/`CALL`/`RETURN`/`THROW` event.
///
/// The hook does not suspend the VM (spec §5); it may only observe, or
/// raise a resource error to abort execution (e.g. a host's cooperative
/// timeout, implemented via [`crate::resource::ResourceTracker::on_tick`]
/// rather than through the tracer itself -- the tracer is for
/// observability, the resource tracker is what can actually refuse to
/// continue).
pub trait VmTracer {
    fn on_event(&mut self, event: TraceEvent<'_>);
}

/// The default: observes nothing.
#[derive(Debug, Default)]
pub struct NoopTracer;

impl VmTracer for NoopTracer {
    fn on_event(&mut self, _event: TraceEvent<'_>) {}
}

/// Writes a one-line summary of every event to stderr; useful for a
/// debugger shell (spec §4.7's mention of "used by the debugger").
#[derive(Debug, Default)]
pub struct StderrTracer;

impl VmTracer for StderrTracer {
    fn on_event(&mut self, event: TraceEvent<'_>) {
        match event {
            TraceEvent::Statement { loc } => eprintln!("trace: stmt {loc}"),
            TraceEvent::Call { callee, loc } => eprintln!("trace: call {callee} at {loc}"),
            TraceEvent::Return { loc } => eprintln!("trace: return at {loc}"),
            TraceEvent::Throw { loc } => eprintln!("trace: throw at {loc}"),
        }
    }
}

/// Records every event for later inspection -- the shape a test harness
/// asserting "this statement ran exactly once" would use.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    pub statements: Vec<CodeLoc>,
    pub calls: Vec<String>,
    pub returns: u32,
    pub throws: u32,
}

impl VmTracer for RecordingTracer {
    fn on_event(&mut self, event: TraceEvent<'_>) {
        match event {
            TraceEvent::Statement { loc } => self.statements.push(loc.clone()),
            TraceEvent::Call { callee, .. } => self.calls.push(callee.to_string()),
            TraceEvent::Return { .. } => self.returns += 1,
            TraceEvent::Throw { .. } => self.throws += 1,
        }
    }
}
