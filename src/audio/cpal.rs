// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    error::Error,
    fmt,
    path::Path,
    sync::atomic::{AtomicU64, Ordering},
    thread,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::{debug, error, info, span, Level};

use super::mixer::{ActiveSource, Mixer};
use super::source::{self, FileSource};
use super::thread_priority::{configure_mixing_thread, mixing_thread_priority, rt_audio_enabled};
use super::{DeviceError, FinishedCallback, Source, SourceError};
use crate::{config, playsync::CancelHandle};

/// Frames mixed per block. Small enough that a new clip starts within a few milliseconds.
const BLOCK_FRAMES: usize = 512;

/// Mixed blocks queued ahead of the output callback.
const QUEUED_BLOCKS: usize = 4;

/// An output device as reported by the host, without opening a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub host: String,
    pub max_channels: u16,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name, self.max_channels, self.host
        )
    }
}

/// A running cpal output. Every started source is handed to a producer thread that owns
/// the mixer; the producer feeds mixed blocks to the stream callback, which hands the
/// spent buffers back for reuse.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The host the device belongs to.
    host_id: cpal::HostId,
    /// Output channel count of the stream.
    channels: u16,
    /// Output sample rate of the stream. Sources are resampled to this on open.
    sample_rate: u32,
    /// New sources for the producer thread.
    sources_tx: Sender<ActiveSource>,
    /// Allocates mixer ids for started sources.
    next_source_id: AtomicU64,
    /// Dropping this stops the output thread, which closes the stream.
    shutdown_tx: Option<Sender<()>>,
    output_thread: Option<thread::JoinHandle<()>>,
    producer_thread: Option<thread::JoinHandle<()>>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists output devices across all available hosts.
    pub fn list() -> Result<Vec<DeviceInfo>, Box<dyn Error>> {
        Ok(list_cpal_devices()?
            .into_iter()
            .map(|(info, _, _)| info)
            .collect())
    }

    /// Opens the configured device and starts its output stream. The name "default"
    /// picks the default output of the default host.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let name = config.device();
        let (device, host_id) = if name == config::audio::DEFAULT_DEVICE {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| DeviceError::NotFound(name.to_string()))?;
            (device, host.id())
        } else {
            list_cpal_devices()?
                .into_iter()
                .find(|(info, _, _)| info.name.trim() == name)
                .map(|(_, device, host_id)| (device, host_id))
                .ok_or_else(|| DeviceError::NotFound(name.to_string()))?
        };

        let supported = device.default_output_config()?;
        let sample_format = supported.sample_format();
        let mut stream_config = supported.config();
        if let Some(sample_rate) = config.sample_rate() {
            stream_config.sample_rate = cpal::SampleRate(sample_rate);
        }

        let device_name = device.name()?;
        let channels = stream_config.channels;
        let sample_rate = stream_config.sample_rate.0;
        info!(
            device = device_name,
            host = host_id.name(),
            channels,
            sample_rate,
            format = ?sample_format,
            "Opening audio output"
        );

        let block_samples = BLOCK_FRAMES * channels as usize;
        let (sources_tx, sources_rx) = crossbeam_channel::unbounded::<ActiveSource>();
        let (blocks_tx, blocks_rx) = crossbeam_channel::bounded::<Vec<f32>>(QUEUED_BLOCKS);
        let (recycle_tx, recycle_rx) = crossbeam_channel::bounded::<Vec<f32>>(QUEUED_BLOCKS + 1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);

        // The stream has to be created and dropped on the same thread on some hosts, so
        // it lives on its own thread until shutdown.
        let output_thread = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let output = Output {
                    blocks_rx,
                    recycle_tx,
                    current: Vec::new(),
                    position: 0,
                };
                let stream = match sample_format {
                    cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, output),
                    cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, output),
                    cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, output),
                    cpal::SampleFormat::I32 => build_stream::<i32>(&device, &stream_config, output),
                    other => Err(format!("unsupported sample format {:?}", other)),
                };
                let stream = match stream.and_then(|stream| {
                    stream.play().map_err(|e| e.to_string())?;
                    Ok(stream)
                }) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // Blocks until the device is dropped.
                let _ = shutdown_rx.recv();
                drop(stream);
                debug!("Audio output stream closed");
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => info!("Audio output stream started"),
            Ok(Err(e)) => {
                let _ = output_thread.join();
                return Err(DeviceError::Backend(e).into());
            }
            Err(_) => {
                let _ = output_thread.join();
                return Err(DeviceError::Backend("audio output thread exited".to_string()).into());
            }
        }

        let priority = mixing_thread_priority();
        let rt_audio = rt_audio_enabled();
        let producer_thread = thread::Builder::new()
            .name("audio-mixer".to_string())
            .spawn(move || {
                configure_mixing_thread(priority, rt_audio);
                produce(
                    Mixer::new(channels),
                    sources_rx,
                    blocks_tx,
                    recycle_rx,
                    block_samples,
                );
            })?;

        Ok(Device {
            name: device_name,
            host_id,
            channels,
            sample_rate,
            sources_tx,
            next_source_id: AtomicU64::new(1),
            shutdown_tx: Some(shutdown_tx),
            output_thread: Some(output_thread),
            producer_thread: Some(producer_thread),
        })
    }
}

impl super::Device for Device {
    fn open(&self, path: &Path) -> Result<Box<dyn Source>, SourceError> {
        let source = FileSource::open(path)?;
        source::resampled(Box::new(source), self.sample_rate)
    }

    fn start(
        &self,
        source: Box<dyn Source>,
        cancel_handle: CancelHandle,
        on_finished: FinishedCallback,
    ) -> Result<(), DeviceError> {
        let span = span!(Level::DEBUG, "start source (cpal)");
        let _enter = span.enter();

        let id = self.next_source_id.fetch_add(1, Ordering::Relaxed);
        debug!(
            device = self.name,
            id,
            channels = source.channel_count(),
            duration = ?source.duration(),
            "Queueing source"
        );

        // A failed send hands the source back inside the error; dropping it releases the
        // decoder without running the callback.
        self.sources_tx
            .send(ActiveSource::new(id, source, cancel_handle, on_finished))
            .map_err(|_| DeviceError::Stopped(self.name.clone()))
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        // Closing the stream drops the block receiver, which stops the producer. The
        // producer's mixer releases any sources still playing on the way out.
        drop(self.shutdown_tx.take());
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
        if let Some(thread) = self.producer_thread.take() {
            let _ = thread.join();
        }
    }
}

/// Lists cpal output devices with their handles.
fn list_cpal_devices() -> Result<Vec<(DeviceInfo, cpal::Device, cpal::HostId)>, Box<dyn Error>> {
    // Suppress noisy output here.
    let _shh_stdout = shh::stdout()?;
    let _shh_stderr = shh::stderr()?;

    let mut devices = Vec::new();
    for host_id in cpal::available_hosts() {
        let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let Ok(output_configs) = device.supported_output_configs() else {
                continue;
            };
            let max_channels = output_configs
                .map(|output_config| output_config.channels())
                .max()
                .unwrap_or(0);
            if max_channels == 0 {
                continue;
            }
            let Ok(name) = device.name() else {
                continue;
            };

            devices.push((
                DeviceInfo {
                    name,
                    host: host_id.name().to_string(),
                    max_channels,
                },
                device,
                host_id,
            ));
        }
    }

    devices.sort_by(|(a, _, _), (b, _, _)| a.name.cmp(&b.name));
    Ok(devices)
}

/// Mixes blocks until the output side goes away. Blocks until the queue has room, so
/// the stream callback paces the mixer.
fn produce(
    mut mixer: Mixer,
    sources_rx: Receiver<ActiveSource>,
    blocks_tx: Sender<Vec<f32>>,
    recycle_rx: Receiver<Vec<f32>>,
    block_samples: usize,
) {
    loop {
        loop {
            match sources_rx.try_recv() {
                Ok(source) => mixer.add(source),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return,
            }
        }

        let mut block = recycle_rx
            .try_recv()
            .unwrap_or_else(|_| Vec::with_capacity(block_samples));
        block.resize(block_samples, 0.0);
        mixer.mix(&mut block);

        if blocks_tx.send(block).is_err() {
            debug!(remaining = mixer.len(), "Audio output closed, stopping mixer");
            return;
        }
    }
}

/// The callback side of the block queue.
struct Output {
    blocks_rx: Receiver<Vec<f32>>,
    recycle_tx: Sender<Vec<f32>>,
    current: Vec<f32>,
    position: usize,
}

impl Output {
    /// Copies queued samples into the device buffer, filling any shortfall with silence.
    fn fill<T: SizedSample + FromSample<f32>>(&mut self, data: &mut [T]) {
        let mut written = 0;
        while written < data.len() {
            if self.position >= self.current.len() {
                let spent = std::mem::take(&mut self.current);
                if spent.capacity() > 0 {
                    let _ = self.recycle_tx.try_send(spent);
                }
                match self.blocks_rx.try_recv() {
                    Ok(block) => {
                        self.current = block;
                        self.position = 0;
                    }
                    Err(_) => {
                        data[written..].fill(T::EQUILIBRIUM);
                        return;
                    }
                }
            }

            let count = (data.len() - written).min(self.current.len() - self.position);
            for (dst, src) in data[written..written + count]
                .iter_mut()
                .zip(&self.current[self.position..self.position + count])
            {
                *dst = T::from_sample(*src);
            }
            written += count;
            self.position += count;
        }
    }
}

fn build_stream<T: SizedSample + FromSample<f32>>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut output: Output,
) -> Result<cpal::Stream, String> {
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| output.fill(data),
            |err| error!("CPAL output stream error: {}", err),
            None,
        )
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    fn output(blocks: Vec<Vec<f32>>) -> (Output, Receiver<Vec<f32>>) {
        let (blocks_tx, blocks_rx) = crossbeam_channel::unbounded();
        let (recycle_tx, recycle_rx) = crossbeam_channel::unbounded();
        for block in blocks {
            blocks_tx.send(block).expect("send block");
        }
        (
            Output {
                blocks_rx,
                recycle_tx,
                current: Vec::new(),
                position: 0,
            },
            recycle_rx,
        )
    }

    #[test]
    fn test_fill_spans_blocks() {
        let (mut output, recycle_rx) = output(vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]]);

        let mut data = [0.0f32; 4];
        output.fill(&mut data);
        assert_eq!([0.1, 0.2, 0.3, 0.4], data);
        assert_eq!(1, recycle_rx.len());

        let mut data = [0.0f32; 4];
        output.fill(&mut data);
        assert_eq!([0.5, 0.6, 0.0, 0.0], data);
        assert_eq!(2, recycle_rx.len());
    }

    #[test]
    fn test_fill_underrun_is_silent() {
        let (mut output, _recycle_rx) = output(Vec::new());
        let mut data = [7i16; 4];
        output.fill(&mut data);
        assert_eq!([0i16; 4], data);

        let mut data = [7u16; 2];
        output.fill(&mut data);
        assert_eq!([u16::EQUILIBRIUM; 2], data);
    }

    #[test]
    fn test_produce_runs_sources_to_completion() {
        use std::sync::mpsc;

        use crate::audio::source::MemorySource;

        let (sources_tx, sources_rx) = crossbeam_channel::unbounded();
        let (blocks_tx, blocks_rx) = crossbeam_channel::bounded(QUEUED_BLOCKS);
        let (_recycle_tx, recycle_rx) = crossbeam_channel::bounded::<Vec<f32>>(1);
        let (done_tx, done_rx) = mpsc::channel();

        sources_tx
            .send(ActiveSource::new(
                1,
                Box::new(MemorySource::new(vec![0.5; 16], 2, 48000)),
                CancelHandle::new(),
                Box::new(move || {
                    let _ = done_tx.send(());
                }),
            ))
            .expect("send source");

        let producer =
            thread::spawn(move || produce(Mixer::new(2), sources_rx, blocks_tx, recycle_rx, 8));

        let first = blocks_rx.recv().expect("first block");
        assert_eq!(vec![0.5; 8], first);
        let second = blocks_rx.recv().expect("second block");
        assert_eq!(vec![0.5; 8], second);
        let third = blocks_rx.recv().expect("third block");
        assert_eq!(vec![0.0; 8], third);
        done_rx
            .recv_timeout(std::time::Duration::from_secs(3))
            .expect("source finished");

        drop(blocks_rx);
        producer.join().expect("producer exits");
    }
}
