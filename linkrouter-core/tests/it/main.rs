use std::{collections::HashMap, sync::Arc};

use linkrouter_core::{
    Condition, Connection, ConnectionHandler, ConnectionId, CoreDriver, CoreOptions, Link, LinkId,
    RouterCore, Terminus,
};
use parking_lot::Mutex;

mod concurrency;
mod lifecycle;

/// What the I/O layer was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Output {
    FirstAttach { link: LinkId, source: Option<Terminus>, target: Option<Terminus> },
    SecondAttach { link: LinkId },
    Detach { link: LinkId, condition: Option<Condition> },
}

/// Records the output per connection.
#[derive(Debug, Default)]
struct Io {
    outputs: Mutex<HashMap<ConnectionId, Vec<Output>>>,
    links: Mutex<HashMap<LinkId, Link>>,
}

impl Io {
    fn take(&self, conn: &Connection) -> Vec<Output> {
        self.outputs.lock().remove(&conn.id()).unwrap_or_default()
    }

    fn count(&self, conn: ConnectionId, f: impl Fn(&Output) -> bool) -> usize {
        self.outputs.lock().get(&conn).map_or(0, |outputs| outputs.iter().filter(|o| f(o)).count())
    }

    fn link(&self, id: LinkId) -> Link {
        self.links.lock()[&id].clone()
    }

    fn push(&self, conn: ConnectionId, output: Output) {
        self.outputs.lock().entry(conn).or_default().push(output);
    }
}

impl ConnectionHandler for Io {
    fn activate(&self, conn: &Connection) {
        if let Some(notify) = conn.context_as::<tokio::sync::Notify>() {
            notify.notify_one();
        }
    }

    fn first_attach(
        &self,
        conn: &Connection,
        link: &Link,
        source: Option<Terminus>,
        target: Option<Terminus>,
    ) {
        self.links.lock().insert(link.id(), link.clone());
        self.push(conn.id(), Output::FirstAttach { link: link.id(), source, target });
    }

    fn second_attach(&self, link: &Link, _source: Option<Terminus>, _target: Option<Terminus>) {
        self.push(link.connection_id(), Output::SecondAttach { link: link.id() });
    }

    fn detach(&self, link: &Link, condition: Option<Condition>) {
        self.push(link.connection_id(), Output::Detach { link: link.id(), condition });
    }
}

fn setup(options: CoreOptions) -> (RouterCore, CoreDriver, Arc<Io>) {
    let _ = tracing_subscriber::fmt::try_init();

    let (core, driver) = RouterCore::new(options);
    let io = Arc::new(Io::default());
    core.register_handlers(io.clone()).unwrap();

    (core, driver, io)
}
