//! Stream integrity properties
//!
//! Whatever is written on one end of a loopback TCP connection arrives on the
//! other end intact and in order, however the reads happen to be split.

use adapters_netlink::Socket;
use proptest::prelude::*;
use std::thread;

fn connected_pair() -> (Socket, Socket) {
    let listener = Socket::listen_tcp(Some("127.0.0.1"), 0, None, None).unwrap();
    let client = Socket::connect_tcp("127.0.0.1", listener.port_to().unwrap()).unwrap();
    let accepted = listener.accept().unwrap().ready().unwrap();
    (client, accepted)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Concatenated reads equal the written bytes.
    #[test]
    fn written_bytes_arrive_in_order(
        payload in prop::collection::vec(any::<u8>(), 1..200_000),
        read_size in 1usize..8192,
    ) {
        let (mut client, mut accepted) = connected_pair();
        let expected = payload.clone();

        let writer = thread::spawn(move || {
            client.write(&payload).unwrap();
            client.disconnect().unwrap();
        });

        let mut received = Vec::with_capacity(expected.len());
        loop {
            let chunk = accepted.read(Some(read_size)).unwrap().ready().unwrap();
            prop_assert!(chunk.len() <= read_size);
            if chunk.is_empty() {
                break;
            }
            received.extend_from_slice(&chunk);
        }
        writer.join().unwrap();
        prop_assert_eq!(received, expected);
    }

    /// Several writes are seen as one ordered stream.
    #[test]
    fn consecutive_writes_concatenate(
        parts in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..512), 1..16),
    ) {
        let (mut client, mut accepted) = connected_pair();
        let expected: Vec<u8> = parts.concat();

        for part in &parts {
            client.write(part).unwrap();
        }
        client.disconnect().unwrap();

        let mut received = Vec::new();
        loop {
            let chunk = accepted.read(None).unwrap().ready().unwrap();
            if chunk.is_empty() {
                break;
            }
            received.extend_from_slice(&chunk);
        }
        prop_assert_eq!(received, expected);
    }
}
