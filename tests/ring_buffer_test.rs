//! Producer-side behaviour of the ring buffer

mod support;

use parking_lot::Mutex;
use ringway::disruptor::{
    BlockingWaitStrategy, ClosureEventHandler, DefaultEventFactory, Disruptor, DisruptorError,
    EventTranslator, ProducerType, RingBuffer, Sequence, YieldingWaitStrategy,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use support::{as_executor, wait_until, StubExecutor, TestEvent};

fn ring_buffer(size: usize, producer_type: ProducerType) -> Arc<RingBuffer<TestEvent>> {
    Arc::new(
        RingBuffer::new(
            size,
            DefaultEventFactory::<TestEvent>::new(),
            producer_type,
            Arc::new(BlockingWaitStrategy::new()),
        )
        .unwrap(),
    )
}

struct ValueTranslator {
    value: i64,
}

impl EventTranslator<TestEvent> for ValueTranslator {
    fn translate_to(&self, event: &mut TestEvent, _sequence: i64) {
        event.value = self.value;
    }
}

#[test]
fn should_block_producer_until_consumer_advances() {
    for producer_type in [ProducerType::Single, ProducerType::Multi] {
        let ring_buffer = ring_buffer(4, producer_type);
        let consumer = Arc::new(Sequence::new_with_initial_value());
        ring_buffer.add_gating_sequences(&[Arc::clone(&consumer)]);

        for value in 0..4 {
            ring_buffer.publish_event(&ValueTranslator { value }).unwrap();
        }

        let published = Arc::new(AtomicBool::new(false));
        let producer = {
            let ring_buffer = Arc::clone(&ring_buffer);
            let published = Arc::clone(&published);
            thread::spawn(move || {
                let sequence = ring_buffer.publish_event(&ValueTranslator { value: 4 });
                published.store(true, Ordering::SeqCst);
                sequence
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!published.load(Ordering::SeqCst), "{producer_type} producer overran the consumer");
        assert_eq!(ring_buffer.get_cursor().get(), 3);

        consumer.set(0);
        assert_eq!(producer.join().unwrap().unwrap(), 4);
        assert_eq!(unsafe { ring_buffer.get(4) }.value, 4);
    }
}

#[test]
fn try_publish_fails_fast_when_full() {
    let ring_buffer = ring_buffer(2, ProducerType::Single);
    let consumer = Arc::new(Sequence::new_with_initial_value());
    ring_buffer.add_gating_sequences(&[Arc::clone(&consumer)]);

    assert_eq!(ring_buffer.try_publish_event(&ValueTranslator { value: 1 }).unwrap(), 0);
    assert_eq!(ring_buffer.try_publish_event(&ValueTranslator { value: 2 }).unwrap(), 1);
    assert!(matches!(
        ring_buffer.try_publish_event(&ValueTranslator { value: 3 }),
        Err(DisruptorError::InsufficientCapacity)
    ));
    assert_eq!(ring_buffer.remaining_capacity(), 0);

    consumer.set(1);
    assert!(ring_buffer.has_available_capacity(2));
    assert_eq!(ring_buffer.try_publish_event(&ValueTranslator { value: 3 }).unwrap(), 2);
    assert_eq!(unsafe { ring_buffer.get(2) }.value, 3);
}

#[test]
fn oversized_claims_are_rejected() {
    let ring_buffer = ring_buffer(4, ProducerType::Multi);

    assert!(matches!(ring_buffer.next_n(0), Err(DisruptorError::InvalidClaim(0))));
    assert!(matches!(ring_buffer.next_n(5), Err(DisruptorError::InvalidClaim(5))));
    assert!(matches!(ring_buffer.try_next_n(5), Err(DisruptorError::InvalidClaim(5))));
    assert_eq!(ring_buffer.get_cursor().get(), -1);
}

#[test]
fn translators_populate_claimed_slot() {
    let ring_buffer = ring_buffer(8, ProducerType::Single);

    let one_arg = |event: &mut TestEvent, _sequence: i64, value: i64| event.value = value;
    let two_arg = |event: &mut TestEvent, sequence: i64, value: i64, producer: usize| {
        event.value = value + sequence;
        event.producer = producer;
    };

    let first = ring_buffer.publish_event_one_arg(&one_arg, 42).unwrap();
    let second = ring_buffer.publish_event_two_arg(&two_arg, 100, 3).unwrap();

    assert_eq!(*unsafe { ring_buffer.get(first) }, TestEvent { value: 42, producer: 0 });
    assert_eq!(*unsafe { ring_buffer.get(second) }, TestEvent { value: 101, producer: 3 });
}

#[test]
fn unpublished_neighbour_is_never_visible() {
    let ring_buffer = ring_buffer(8, ProducerType::Multi);

    let held = ring_buffer.next().unwrap();
    let written = ring_buffer
        .publish_with(|event, _| {
            event.value = 7;
            event.producer = 2;
        })
        .unwrap();

    assert_eq!((held, written), (0, 1));
    assert!(ring_buffer.is_available(written));
    assert!(!ring_buffer.is_available(held));
    assert_eq!(ring_buffer.get_cursor().get(), -1);

    // SAFETY: `held` was claimed above and has not been published
    unsafe { ring_buffer.get_mut(held).value = 3 };
    ring_buffer.publish(held);

    assert_eq!(ring_buffer.get_cursor().get(), 1);
    assert_eq!(*unsafe { ring_buffer.get(held) }, TestEvent { value: 3, producer: 0 });
    assert_eq!(*unsafe { ring_buffer.get(written) }, TestEvent { value: 7, producer: 2 });
}

#[test]
fn batch_publish_fills_every_claimed_slot() {
    let ring_buffer = ring_buffer(8, ProducerType::Single);
    ring_buffer.publish_event(&ValueTranslator { value: -1 }).unwrap();

    let high = ring_buffer
        .batch_publish(5, |batch| {
            assert_eq!(batch.len(), 5);
            for (offset, event) in batch.enumerate() {
                event.value = offset as i64 * 10;
            }
        })
        .unwrap();

    assert_eq!(high, 5);
    assert_eq!(ring_buffer.get_cursor().get(), 5);
    let values: Vec<i64> = (1..=5).map(|sequence| unsafe { ring_buffer.get(sequence) }.value).collect();
    assert_eq!(values, vec![0, 10, 20, 30, 40]);
}

#[test]
fn panicking_translator_still_publishes_its_slot() {
    let ring_buffer = ring_buffer(4, ProducerType::Multi);

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        ring_buffer
            .publish_with(|_event, _sequence| panic!("translator failed"))
            .unwrap();
    }));

    assert!(outcome.is_err());
    assert_eq!(ring_buffer.get_cursor().get(), 0);
    assert_eq!(ring_buffer.publish_event(&ValueTranslator { value: 9 }).unwrap(), 1);
}

#[test]
fn multiple_producers_deliver_every_event_contiguously() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: i64 = 5_000;

    let executor = StubExecutor::new();
    let mut disruptor = Disruptor::new(
        DefaultEventFactory::<TestEvent>::new(),
        256,
        ProducerType::Multi,
        Arc::new(YieldingWaitStrategy::new()),
        as_executor(&executor),
    )
    .unwrap();

    let seen = Arc::new(Mutex::new(Vec::with_capacity(PRODUCERS * PER_PRODUCER as usize)));
    let gaps = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        let gaps = Arc::clone(&gaps);
        let mut expected = 0i64;
        disruptor
            .handle_events_with(ClosureEventHandler::new(
                move |event: &TestEvent, sequence, _end_of_batch| {
                    if sequence != expected {
                        gaps.lock().push((expected, sequence));
                    }
                    expected = sequence + 1;
                    seen.lock().push((event.producer, event.value));
                    Ok(())
                },
            ))
            .unwrap();
    }

    let ring_buffer = disruptor.start().unwrap();
    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let ring_buffer = Arc::clone(&ring_buffer);
            thread::spawn(move || {
                for value in 0..PER_PRODUCER {
                    ring_buffer
                        .publish_with(|event, _| {
                            event.producer = producer;
                            event.value = value;
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    disruptor.shutdown(Duration::from_secs(10)).unwrap();
    executor.join_all();

    assert!(gaps.lock().is_empty());
    let seen = seen.lock();
    assert_eq!(seen.len(), PRODUCERS * PER_PRODUCER as usize);
    for producer in 0..PRODUCERS {
        let values: Vec<i64> = seen
            .iter()
            .filter(|(from, _)| *from == producer)
            .map(|(_, value)| *value)
            .collect();
        assert_eq!(values, (0..PER_PRODUCER).collect::<Vec<_>>());
    }
}

#[test]
fn first_stage_reads_exactly_what_was_written() {
    let executor = StubExecutor::new();
    let mut disruptor = Disruptor::new(
        DefaultEventFactory::<TestEvent>::new(),
        16,
        ProducerType::Multi,
        Arc::new(BlockingWaitStrategy::new()),
        as_executor(&executor),
    )
    .unwrap();

    let mismatches = Arc::new(Mutex::new(Vec::new()));
    {
        let mismatches = Arc::clone(&mismatches);
        disruptor
            .handle_events_with(ClosureEventHandler::new(
                move |event: &TestEvent, sequence, _end_of_batch| {
                    if event.value != sequence * 7 || event.producer != sequence as usize % 3 {
                        mismatches.lock().push(sequence);
                    }
                    Ok(())
                },
            ))
            .unwrap();
    }

    let ring_buffer = disruptor.start().unwrap();
    let producers: Vec<_> = (0..3)
        .map(|_| {
            let ring_buffer = Arc::clone(&ring_buffer);
            thread::spawn(move || {
                for _ in 0..1_000 {
                    ring_buffer
                        .publish_with(|event, sequence| {
                            event.value = sequence * 7;
                            event.producer = sequence as usize % 3;
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    disruptor.shutdown(Duration::from_secs(10)).unwrap();
    executor.join_all();
    assert!(wait_until(|| disruptor.cursor() == 2_999));
    assert!(mismatches.lock().is_empty());
}
