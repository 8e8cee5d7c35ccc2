//! This library reads time-aligned blocks of samples from several
//! independently clocked signal streams.
//!
//! Each stream is fed packets by a producer through its own queue. The
//! reader resolves a common clock from the streams' domain descriptors,
//! discards samples preceding the first instant every stream covers, and
//! then hands out common samples: for each one, stream `i` delivers
//! `divider_i` native samples. Descriptor changes and gaps arrive in-band
//! and pause the reader until acknowledged.
//!
//! # Usage
//!
//! ```rust
//! use sigsync_core::{
//!     DataDescriptor, DeliveryMode, DomainDescriptor, DomainInfo, MultiReader,
//!     MultiReaderBuilder, Packet, Ratio, ReadStatus, ReaderConfig, SampleType, channel,
//! };
//! use std::time::Duration;
//!
//! # fn main() -> sigsync_core::Result<()> {
//! // One stream at 1 kHz, one at 500 Hz, both in millisecond ticks.
//! let millis = Ratio::new(1, 1000)?;
//! let (fast_tx, fast_rx) = channel(DeliveryMode::Direct);
//! let (slow_tx, slow_rx) = channel(DeliveryMode::Direct);
//!
//! let reader: MultiReader = MultiReaderBuilder::new()
//!     .with_config(ReaderConfig::default())
//!     .add_input_with_descriptors(
//!         fast_rx,
//!         DataDescriptor::new(SampleType::Float64),
//!         DomainDescriptor::linear(1, 0, millis),
//!     )
//!     .add_input_with_descriptors(
//!         slow_rx,
//!         DataDescriptor::new(SampleType::Float64),
//!         DomainDescriptor::linear(2, 0, millis),
//!     )
//!     .build()?;
//!
//! fast_tx.send(Packet::data(0, vec![0.0f64; 100]))?;
//! slow_tx.send(Packet::data(0, vec![0.0f64; 50]))?;
//!
//! // Every common sample takes two samples from the fast stream.
//! let mut fast = vec![0.0; 20];
//! let mut slow = vec![0.0; 10];
//! let result = reader.read(&mut [&mut fast[..], &mut slow[..]], 10, Duration::ZERO);
//! assert_eq!(result.status, ReadStatus::Ok);
//! assert_eq!(result.count, 10);
//! assert_eq!(reader.common_sample_rate(), Some(500.0));
//! # Ok(())
//! # }
//! ```

pub mod aligner;
pub mod buffer;
mod builder;
mod config;
pub mod connection;
mod coordinator;
mod descriptor;
mod error;
mod packet;
mod reader;
mod sample;
pub mod signal;
pub mod state;
mod types;

pub use builder::MultiReaderBuilder;
pub use config::{ReadMode, ReaderConfig, TimeoutType};
pub use connection::{
    ArrivalNotifier, Connection, DeliveryMode, PacketQueue, Producer, bounded_channel, channel,
};
pub use coordinator::{DataAvailableCallback, SynchronizationCoordinator};
pub use descriptor::{
    DataDescriptor, DomainDescriptor, DomainRule, LinearScaling, Ratio, SampleType, Unit,
};
pub use error::{ReaderError, Result};
pub use packet::{DataPacket, EventPacket, Packet};
pub use reader::{DomainInfo, MultiReader, ReaderControl};
pub use sample::{Sample, SampleData};
pub use types::{ReadResult, ReadStatus, StreamId};
