// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Structural change notifications between topology instances

pub mod codec;
pub mod message;
pub mod publisher;

pub use codec::NotificationCodec;
pub use message::{
    EdgeLabelRef, EdgeRoleMessage, LabelMessage, Notification, PropertyColumnMessage,
    RemovedEdgeRoleMessage, RenamedPropertyMessage, SchemaMessage,
};
pub use publisher::{BusEntry, BusSubscription, MemoryBus, NotificationPublisher};
