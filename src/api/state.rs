use crate::control::ControlPlane;
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    pub plane: Arc<ControlPlane>,
}

impl ApiState {
    pub fn new(plane: Arc<ControlPlane>) -> Self {
        Self { plane }
    }
}
