mod client;

pub use client::{
    OperationStatus, Resource, ResourceList, ResourceType, TransferLink, YadiskClient,
    YadiskError,
};
