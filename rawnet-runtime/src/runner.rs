use crate::clock::Clock;
use crate::device::Device;
use crate::ethernet::EthernetLayer;
use crate::StackError;
use crossbeam::atomic::AtomicCell;
use crossbeam::channel::{self, Sender, TrySendError};
use rawnet_packets::{PacketData, ARP_ETHER_TYPE, ETHERNET_MAX_FRAME_LEN};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed set of threads running jobs from a bounded queue.
///
/// Submitting never blocks: when the queue is full the job is handed back. Dropping the pool
/// lets the workers finish what is already queued, then joins them.
pub struct WorkerPool {
    jobs: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(workers: usize, queue_depth: usize) -> Result<WorkerPool, StackError> {
        let (sender, receiver) = channel::bounded::<Job>(queue_depth.max(1));
        let handles = (0..workers.max(1))
            .map(|n| {
                let receiver = receiver.clone();
                thread::Builder::new()
                    .name(format!("rawnet-worker-{}", n))
                    .spawn(move || {
                        for job in receiver.iter() {
                            job();
                        }
                    })
                    .map_err(StackError::Device)
            })
            .collect::<Result<Vec<JoinHandle<()>>, StackError>>()?;

        Ok(WorkerPool {
            jobs: Some(sender),
            workers: handles,
        })
    }

    pub fn submit(&self, job: Job) -> Result<(), Job> {
        match &self.jobs {
            Some(jobs) => jobs.try_send(job).map_err(|err| match err {
                TrySendError::Full(job) | TrySendError::Disconnected(job) => job,
            }),
            None => Err(job),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the queue ends each worker's loop
        self.jobs.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// The receive path: one thread pulling frames off the device, timestamping them, and handing
/// each to the worker pool, so a handler that blocks (an IPv4 send waiting on ARP) never stalls
/// capture.
///
/// ARP frames skip the pool and are handled on the receive thread. Workers blocked in a
/// resolution wait for exactly those frames, and ARP handling itself never waits.
pub struct FrameReceiver {
    stopped: Arc<AtomicCell<bool>>,
    thread: Option<JoinHandle<()>>,
}

impl FrameReceiver {
    pub fn spawn(
        device: Arc<dyn Device>,
        ethernet: Arc<EthernetLayer>,
        clock: Arc<dyn Clock>,
        pool: WorkerPool,
    ) -> Result<FrameReceiver, StackError> {
        let stopped = Arc::new(AtomicCell::new(false));
        let stop = stopped.clone();

        let thread = thread::Builder::new()
            .name(String::from("rawnet-receiver"))
            .spawn(move || receive_loop(&*device, ethernet, &*clock, &pool, &stop))
            .map_err(StackError::Device)?;

        Ok(FrameReceiver {
            stopped,
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        !self.stopped.load()
    }

    /// Stops capturing and waits for queued frames to be processed.
    pub fn stop(&mut self) {
        self.stopped.store(true);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for FrameReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn receive_loop(
    device: &dyn Device,
    ethernet: Arc<EthernetLayer>,
    clock: &dyn Clock,
    pool: &WorkerPool,
    stopped: &AtomicCell<bool>,
) {
    let mut buffer = vec![0u8; ETHERNET_MAX_FRAME_LEN];
    let mut dropped: u64 = 0;
    info!("receiver started");

    while !stopped.load() {
        let len = match device.receive(&mut buffer) {
            Ok(Some(len)) => len,
            Ok(None) => continue,
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                error!(error = %err, "device receive failed, receiver stopping");
                break;
            }
        };

        let timestamp = clock.now();
        let frame: PacketData = buffer[..len].to_vec();
        if ether_type(&frame) == Some(ARP_ETHER_TYPE) {
            if let Err(err) = ethernet.on_frame(frame, timestamp) {
                debug!(error = %err, "dropping frame");
            }
            continue;
        }

        let layer = ethernet.clone();
        let job: Job = Box::new(move || {
            if let Err(err) = layer.on_frame(frame, timestamp) {
                debug!(error = %err, "dropping frame");
            }
        });
        if pool.submit(job).is_err() {
            dropped += 1;
            warn!(dropped, "worker queue full, dropping frame");
        }
    }

    stopped.store(true);
    info!(dropped, "receiver stopped");
}

fn ether_type(frame: &[u8]) -> Option<u16> {
    frame
        .get(12..14)
        .map(|bytes| u16::from_be_bytes([bytes[0], bytes[1]]))
}
