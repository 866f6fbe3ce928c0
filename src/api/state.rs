use super::*;

#[derive(Clone)]
pub(super) struct AppState {
    pub(super) sender: Sender<ApiCommand>,
    pub(super) store: Store,
    pub(super) designer: Designer,
    pub(super) bridge: EventBridge,
}
