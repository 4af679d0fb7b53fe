use std::thread;

/// Spawns a background thread with a `tessel-` prefixed name.
pub fn spawn_named<F>(name: &str, task: F)
where F: FnOnce() + Send + 'static {
    let thread_name = format!("tessel-{name}");

    if let Err(err) = thread::Builder::new().name(thread_name.clone()).spawn(task) {
        tracing::error!(thread = %thread_name, error = %err, "failed to spawn thread");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::channel;
    use std::time::Duration;

    use super::*;

    #[test]
    fn spawn_named_executes_task() {
        let (tx, rx) = channel();

        spawn_named("test-task", move || {
            tx.send(42).unwrap();
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 42);
    }

    #[test]
    fn spawn_named_uses_correct_prefix() {
        let (tx, rx) = channel();

        spawn_named("name-test", move || {
            let current = thread::current();
            tx.send(current.name().unwrap_or("").to_string()).unwrap();
        });

        let thread_name = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(thread_name, "tessel-name-test");
    }
}
