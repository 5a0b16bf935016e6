// MQ Loadgen Infrastructure - AMQP Adapter
// Implements: BrokerConnector, BrokerConnection, BrokerChannel

pub mod amqp_broker;

pub use amqp_broker::AmqpConnector;
