use tokio::sync::watch;

///Read-only view of which cameras the registry currently manages. Updated once per
///reconciliation cycle.
#[derive(Debug, Clone)]
pub struct FleetStatus {
    managed: watch::Receiver<Vec<String>>,
}

impl FleetStatus {
    pub fn new(managed: watch::Receiver<Vec<String>>) -> Self {
        Self { managed }
    }

    ///A status that is updated by hand through the returned sender.
    pub fn channel() -> (watch::Sender<Vec<String>>, Self) {
        let (tx, rx) = watch::channel(Vec::new());
        (tx, Self::new(rx))
    }

    ///Sorted camera ids.
    pub fn managed_ids(&self) -> Vec<String> {
        self.managed.borrow().clone()
    }

    pub fn count(&self) -> usize {
        self.managed.borrow().len()
    }
}
