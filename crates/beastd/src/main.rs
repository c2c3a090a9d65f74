mod cli;
mod config;
mod net;
mod output;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use config::Config;
use mode_s_core::decode::decode_frame;
use net::beast::{self, MessageType};
use net::mux::Mux;
use net::{raw, sbs, Protocol};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracker1090::{Tracker, TrackerConfig};

/// One decoded-frame-worth of input, tagged with the wire clock it arrived
/// on, regardless of which input protocol produced it (§4.3 upstream of
/// the decoder doesn't care).
struct InboundFrame {
    payload: Vec<u8>,
    timestamp_12mhz: u64,
    signal_level: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let options = cli::Options::parse();
    let config: Config = options.into();

    let mux = Arc::new(Mux::new());
    let (inbound_tx, mut inbound_rx) = mpsc::channel::<InboundFrame>(4096);

    for service in &config.services {
        match (&service.listen_port, &service.connect_to) {
            (Some(port), None) if service.protocol.is_input() => {
                spawn_input_listener(*port, service.protocol, inbound_tx.clone()).await?;
            }
            (Some(port), None) => {
                let addr = format!("0.0.0.0:{port}");
                mux.clone().listen(&addr, service.protocol, None).await?;
            }
            (None, Some(connector)) if service.protocol.is_input() => {
                spawn_input_connector(connector.host.clone(), connector.port, service.protocol, inbound_tx.clone());
            }
            (None, Some(connector)) => {
                mux.clone().connect_out(
                    connector.host.clone(),
                    connector.port,
                    service.protocol,
                    Duration::from_millis(config.net_connector_delay_ms),
                    None,
                );
            }
            _ => {}
        }
    }

    let mut output_file = if let Some(path) = &config.json_log_path {
        Some(tokio::fs::OpenOptions::new().append(true).create(true).open(path).await?)
    } else {
        None
    };

    let mut tracker = Tracker::with_config(TrackerConfig {
        filter_persistence: config.filter_persistence,
        expire_after_minutes: config.expire_after_minutes,
        max_range_nm: config.max_range_nm,
        receiver_position: config.receiver_position,
    });
    let mut messages_total: u64 = 0;

    let start = tokio::time::Instant::now();
    let mut rotate_tick = tokio::time::interval(Duration::from_secs(60));
    let mut snapshot_tick = tokio::time::interval(Duration::from_millis(config.snapshot_interval_ms.max(250)));
    let mut heartbeat_tick = tokio::time::interval(Duration::from_secs(1));
    let heartbeat_interval = Duration::from_millis(config.heartbeat_interval_ms.max(1));

    loop {
        tokio::select! {
            frame = inbound_rx.recv() => {
                let Some(frame) = frame else { break };
                let now_ms = start.elapsed().as_millis() as u64;
                handle_inbound_frame(frame, now_ms, &config, &mut tracker, &mux, &mut output_file, &mut messages_total).await;
            }
            _ = rotate_tick.tick() => {
                tracker.rotate_filter();
                tracker.periodic(start.elapsed().as_millis() as u64);
            }
            _ = snapshot_tick.tick() => {
                let now_ms = start.elapsed().as_millis() as u64;
                if let Some(dir) = &config.snapshot_dir {
                    write_snapshot(dir, &tracker, messages_total, now_ms).await;
                }
                broadcast_periodic_formats(&mux, &mut tracker, now_ms).await;
            }
            _ = heartbeat_tick.tick() => {
                for protocol in [Protocol::BeastOut, Protocol::BeastReduceOut, Protocol::RawOut, Protocol::SbsOut] {
                    mux.heartbeat_if_idle(protocol, heartbeat_interval).await;
                }
            }
        }
    }

    info!(total = messages_total, "input exhausted, shutting down");
    Ok(())
}

/// Broadcasts the two state-snapshot output formats (§6): FATSV and VRS
/// JSON aren't per-frame like Beast/raw/SBS, they report the tracker's
/// current fused state, so they ride the same cadence as the snapshot
/// files rather than the per-message decode path.
async fn broadcast_periodic_formats(mux: &Arc<Mux>, tracker: &mut Tracker, now_ms: u64) {
    if mux.client_count(Protocol::VrsOut).await > 0 {
        let response = output::vrs_json::encode_response(tracker.iter().map(|(_, t)| t));
        if let Ok(body) = serde_json::to_vec(&response) {
            mux.broadcast(Protocol::VrsOut, &body).await;
        }
    }
    // FATSV rides beast_reduce_out's slot: readsb's own FATSV output is a
    // TCP service distinct from the Beast-reduce feed, but this crate has
    // no dedicated fatsv_out protocol slot (not named in §6's connector
    // list), so reduced-rate aircraft updates share beast_reduce_out's
    // client set instead of inventing a ninth protocol. Each aircraft still
    // goes through the same change-triggered/debounced/periodic gate as
    // everything else in §4.7 rather than being dumped every tick.
    if mux.client_count(Protocol::BeastReduceOut).await > 0 {
        for (_, track) in tracker.iter_mut() {
            if track.poll_emit(now_ms) == tracker1090::scheduler::EmitDecision::Skip {
                continue;
            }
            let line = output::fatsv::encode(track, now_ms);
            mux.broadcast(Protocol::BeastReduceOut, line.as_bytes()).await;
        }
    }
}

async fn write_snapshot(dir: &str, tracker: &Tracker, messages_total: u64, now_ms: u64) {
    use output::snapshot::{write_atomic, AircraftFile, AircraftSnapshot, StatsFile};
    let dir = std::path::Path::new(dir);
    if tokio::fs::create_dir_all(dir).await.is_err() {
        return;
    }
    let aircraft: Vec<AircraftSnapshot> = tracker
        .iter()
        .map(|(addr, t)| AircraftSnapshot {
            hex: format!("{addr:06X}"),
            callsign: t.callsign.clone(),
            squawk: t.squawk,
            altitude: t.altitude_baro,
            lat: t.position.map(|(lat, _)| lat),
            lon: t.position.map(|(_, lon)| lon),
            ground_speed: t.ground_speed,
            track: t.track,
            seen_ms: t.last_seen_ms,
        })
        .collect();
    let count = aircraft.len();
    let _ = write_atomic(dir, "aircraft", &AircraftFile { now_ms, messages: messages_total, aircraft }).await;
    let _ = write_atomic(dir, "stats", &StatsFile { now_ms, tracks: count, messages_total }).await;
}

#[allow(clippy::too_many_arguments)]
async fn handle_inbound_frame(
    frame: InboundFrame,
    now_ms: u64,
    config: &Config,
    tracker: &mut Tracker,
    mux: &Arc<Mux>,
    output_file: &mut Option<tokio::fs::File>,
    messages_total: &mut u64,
) {
    match decode_frame(&frame.payload, tracker.filter(), frame.signal_level, frame.timestamp_12mhz, now_ms, config.nfix_crc) {
            Ok(message) => {
                *messages_total += 1;
                let track = tracker.update(&message);

                if let Some(file) = &mut *output_file {
                    if let Ok(json) = serde_json::to_string(&message) {
                        let _ = file.write_all(json.as_bytes()).await;
                        let _ = file.write_all(b"\n").await;
                    }
                }
                if config.verbose {
                    if let Ok(json) = serde_json::to_string(&message) {
                        println!("{json}");
                    }
                }

                mux.broadcast(Protocol::RawOut, raw::encode_line(&message.raw_corrected, Some(frame.timestamp_12mhz)).as_bytes()).await;
                mux.broadcast(
                    Protocol::BeastOut,
                    &beast::encode_frame(
                        beast_message_type(message.nbits),
                        frame.timestamp_12mhz,
                        message.signal_level as u8,
                        &message.raw_corrected,
                    ),
                )
                .await;
                if track.accept_reduce_forward(now_ms, message.cpr.is_some()) {
                    mux.broadcast(
                        Protocol::BeastReduceOut,
                        &beast::encode_frame(
                            beast_message_type(message.nbits),
                            frame.timestamp_12mhz,
                            message.signal_level as u8,
                            &message.raw_corrected,
                        ),
                    )
                    .await;
                }
                // SBS only reports the tracker's fused state, so it rides the
                // same change-triggered/debounced/periodic gate as the
                // snapshot/VRS/FATSV outputs (§4.7) rather than every frame.
                let emit_decision = track.poll_emit(now_ms);
                if emit_decision != tracker1090::scheduler::EmitDecision::Skip && mux.client_count(Protocol::SbsOut).await > 0 {
                    let row = sbs::encode_msg3(
                        track.address,
                        track.callsign.as_deref(),
                        track.altitude_baro.map(|v| v as i32),
                        track.ground_speed,
                        track.track,
                        track.position.map(|(lat, _)| lat),
                        track.position.map(|(_, lon)| lon),
                        track.vertical_rate_baro,
                        track.squawk,
                        track.air_ground == mode_s_core::message::AirGround::Ground,
                        Utc::now(),
                    );
                    mux.broadcast(Protocol::SbsOut, row.as_bytes()).await;
                }
            }
            Err(mode_s_core::decode::DecodeError::UnknownIcao) => {
                // frame dropped, stat incremented (§7); no address to anchor a retry on
            }
            Err(mode_s_core::decode::DecodeError::Bad) => {}
    }
}

fn beast_message_type(nbits: usize) -> MessageType {
    if nbits > 56 { MessageType::ModeSLong } else { MessageType::ModeSShort }
}

async fn spawn_input_listener(port: u16, protocol: Protocol, tx: mpsc::Sender<InboundFrame>) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%protocol, %addr, "listening for input");
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, peer)) => {
                    info!(%protocol, %peer, "input feeder connected");
                    tokio::spawn(read_input_connection(socket, protocol, tx.clone()));
                }
                Err(e) => warn!(%protocol, error = %e, "accept failed"),
            }
        }
    });
    Ok(())
}

fn spawn_input_connector(host: String, port: u16, protocol: Protocol, tx: mpsc::Sender<InboundFrame>) {
    tokio::spawn(async move {
        loop {
            let addr = format!("{host}:{port}");
            match tokio::time::timeout(Duration::from_secs(10), tokio::net::TcpStream::connect(&addr)).await {
                Ok(Ok(socket)) => {
                    info!(%protocol, %addr, "input connector established");
                    read_input_connection(socket, protocol, tx.clone()).await;
                }
                Ok(Err(e)) => warn!(%protocol, %addr, error = %e, "input connector failed"),
                Err(_) => warn!(%protocol, %addr, "input connector timed out after 10s"),
            }
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
    });
}

/// Owns its own per-connection framing state so concurrent feeders never
/// share (and corrupt) a decoder's byte-stream position.
async fn read_input_connection(mut socket: tokio::net::TcpStream, protocol: Protocol, tx: mpsc::Sender<InboundFrame>) {
    use tokio::io::AsyncReadExt;
    let mut buf = [0u8; 4096];
    let mut beast_decoder = beast::Decoder::new();
    let mut line_buf = Vec::new();

    loop {
        let n = match socket.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                error!(%protocol, error = %e, "input read failed");
                break;
            }
        };

        match protocol {
            Protocol::BeastIn => {
                for &byte in &buf[..n] {
                    if let Some(frame) = beast_decoder.feed(byte) {
                        let _ = tx
                            .send(InboundFrame {
                                payload: frame.payload,
                                timestamp_12mhz: frame.timestamp_12mhz,
                                signal_level: frame.signal as f64 / 255.0,
                            })
                            .await;
                    }
                }
            }
            Protocol::RawIn => {
                line_buf.extend_from_slice(&buf[..n]);
                while let Some(pos) = line_buf.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = line_buf.drain(..=pos).collect();
                    if let Ok(text) = std::str::from_utf8(&line) {
                        if let Some(parsed) = raw::parse_line(text) {
                            let _ = tx
                                .send(InboundFrame {
                                    payload: parsed.payload,
                                    timestamp_12mhz: parsed.timestamp_12mhz.unwrap_or(0),
                                    signal_level: parsed.signal.map(|s| s as f64 / 255.0).unwrap_or(1.0),
                                })
                                .await;
                        }
                    }
                }
            }
            Protocol::SbsIn => {
                line_buf.extend_from_slice(&buf[..n]);
                while let Some(pos) = line_buf.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = line_buf.drain(..=pos).collect();
                    if let Ok(text) = std::str::from_utf8(&line) {
                        // SBS rows carry no raw Mode S bytes to re-decode;
                        // they're consumed downstream of the decoder, not
                        // fed into it (§6 lists MSG,3 consumption as a
                        // position-only input, unlike Beast/raw).
                        let _ = sbs::parse_msg3(text);
                    }
                }
            }
            _ => break,
        }
    }
}

