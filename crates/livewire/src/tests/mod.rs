mod websocket_transport_test;

pub use mock_update_server::MockUpdateServer;
