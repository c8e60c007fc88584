// Operation notifications bracketing slow-path work. The guard closes the
// operation on every exit path, including unwinds.

use serde_json::{json, Value};

/// Collects outgoing notifications; the server flushes them to the wire.
pub trait Sink {
    fn send(&mut self, message: Value);
}

impl Sink for Vec<Value> {
    fn send(&mut self, message: Value) {
        self.push(message);
    }
}

pub struct OperationGuard<'a, S: Sink> {
    sink: &'a mut S,
    name: &'static str,
}

impl<'a, S: Sink> OperationGuard<'a, S> {
    pub fn begin(sink: &'a mut S, name: &'static str) -> OperationGuard<'a, S> {
        sink.send(operation_notification(name, "begin"));
        OperationGuard { sink, name }
    }
}

impl<S: Sink> Drop for OperationGuard<'_, S> {
    fn drop(&mut self) {
        self.sink.send(operation_notification(self.name, "end"));
    }
}

fn operation_notification(name: &str, status: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "sable/showOperation",
        "params": { "operationName": name, "status": status },
    })
}
