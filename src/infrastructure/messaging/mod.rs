//! Redis Streams implementations of the broker traits.

pub mod redis_stream;

pub use redis_stream::{
    ConsumerSettings, ProducerSettings, RedisStreamConsumer, RedisStreamProducer, StreamInfo,
    StreamWriter, connect, stream_info,
};
