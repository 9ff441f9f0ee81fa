//! Per-connection request loop: the JOIN/WELCOME handshake, the
//! control-plane command dispatch table, and the snapshot/persistence
//! triggers a session drives on behalf of its client.

use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::Arc;

use rw_protocol::frame::{recv_hdr, recv_payload, send_msg, send_msg_noblock};
use rw_protocol::wire::{
    self, Ack, CreateSim, GlobalModeChanged, Join, LoadResults, LoadWorld, MoveProbs as WireProbs, MsgType,
    Progress as WireProgress, QueryStatus, Quit, RequestSnapshot, RestartSim, SaveResults, SetGlobalMode, Status,
    StopSim, Welcome, WireError, WireSize,
};

use crate::context::{ClientId, GlobalMode};
use crate::persist::{self, Header};
use crate::random_walk::MoveProbs;
use crate::server::Server;
use crate::sim_manager::SimState;
use crate::snapshot::{self, Field};
use crate::world::{World, WorldKind, WorldSize};

/// Deterministic obstacle placement used by `CREATE_SIM{kind=OBSTACLES}`:
/// the wire message carries no density/seed fields, so both are fixed
/// constants here rather than config the client can steer.
const DEFAULT_OBSTACLE_PERCENT: i32 = 10;
const DEFAULT_OBSTACLE_SEED: u32 = 12345;

/// Error codes returned in `ERROR.code`. See DESIGN.md for how these were
/// assigned from the spec's code ranges.
#[repr(u32)]
enum ErrCode {
    Permission = 1,
    Busy = 2,
    InvalidArgs = 3,
    BadProbabilities = 4,
    CreateSimWorldInit = 5,
    CreateSimObstacleRegen = 6,
    SaveResultsIo = 8,
    MissingManager = 9,
    StartFailed = 10,
    SnapshotSendFailed = 12,
    SnapshotPrecondition = 13,
    LoadWorldIo = 14,
    LoadResultsIo = 15,
}

/// Run one client's connection end to end: handshake, register, serve the
/// command loop, then unregister on disconnect or `QUIT`. Intended to run
/// on its own thread per accepted connection.
pub fn run_session(server: Arc<Server>, mut stream: UnixStream) {
    let client_id = match handshake(&server, &mut stream) {
        Some(id) => id,
        None => return,
    };

    command_loop(&server, client_id, &mut stream);

    server.ctx.registry.unregister(client_id);
}

fn handshake(server: &Arc<Server>, stream: &mut UnixStream) -> Option<ClientId> {
    let hdr = recv_hdr(stream).ok()?;
    if hdr.msg_type != MsgType::Join as u16 {
        return None;
    }
    let payload = recv_payload(stream, hdr.payload_len).ok()?;
    let join = Join::decode(&payload).ok()?;

    let writer = stream.try_clone().ok()?;
    let client_id = server.ctx.registry.register(join.pid, writer)?;

    let welcome = build_welcome(server);
    if send_msg(stream, MsgType::Welcome as u16, &welcome.encode()).is_err() {
        server.ctx.registry.unregister(client_id);
        return None;
    }
    Some(client_id)
}

fn command_loop(server: &Arc<Server>, client_id: ClientId, stream: &mut UnixStream) {
    loop {
        let hdr = match recv_hdr(stream) {
            Ok(hdr) => hdr,
            Err(_) => return,
        };
        let payload = match recv_payload(stream, hdr.payload_len) {
            Ok(p) => p,
            Err(_) => return,
        };

        // Unrecognized message types are tolerated for forward compatibility:
        // the payload is already drained above, so we just keep looping.
        let msg_type = match MsgType::from_u16(hdr.msg_type) {
            Ok(t) => t,
            Err(_) => continue,
        };

        match msg_type {
            MsgType::QueryStatus => handle_query_status(server, client_id, stream, &payload),
            MsgType::SetGlobalMode => handle_set_global_mode(server, client_id, stream, &payload),
            MsgType::CreateSim => handle_create_sim(server, client_id, stream, &payload),
            MsgType::LoadWorld => handle_load_world(server, client_id, stream, &payload),
            MsgType::StartSim => handle_start_sim(server, client_id, stream),
            MsgType::RestartSim => handle_restart_sim(server, client_id, stream, &payload),
            MsgType::StopSim => handle_stop_sim(server, client_id, stream, &payload),
            MsgType::RequestSnapshot => handle_request_snapshot(server, client_id, stream, &payload),
            MsgType::SaveResults => handle_save_results(server, client_id, stream, &payload),
            MsgType::LoadResults => handle_load_results(server, client_id, stream, &payload),
            MsgType::Quit => {
                handle_quit(server, client_id, stream, &payload);
                return;
            }
            _ => send_error(stream, ErrCode::InvalidArgs, "message type not valid in the command loop"),
        }
    }
}

fn send_ack(stream: &mut UnixStream, request_type: MsgType) {
    let ack = Ack { request_type: request_type as u16, status: 0 };
    let _ = send_msg(stream, MsgType::Ack as u16, &ack.encode());
}

fn send_error(stream: &mut UnixStream, code: ErrCode, message: &str) {
    let err = WireError { code: code as u32, message: message.to_string() };
    let _ = send_msg(stream, MsgType::Error as u16, &err.encode());
}

fn broadcast(server: &Server, msg_type: MsgType, payload: &[u8]) {
    server.ctx.registry.for_each_client(|c| {
        let _ = send_msg_noblock(&c.stream, msg_type as u16, payload);
    });
}

fn to_wire_world_kind(k: WorldKind) -> wire::WorldKind {
    match k {
        WorldKind::Wrap => wire::WorldKind::Wrap,
        WorldKind::Obstacles => wire::WorldKind::Obstacles,
    }
}

fn from_wire_world_kind(k: wire::WorldKind) -> WorldKind {
    match k {
        wire::WorldKind::Wrap => WorldKind::Wrap,
        wire::WorldKind::Obstacles => WorldKind::Obstacles,
    }
}

fn to_wire_global_mode(m: GlobalMode) -> wire::GlobalMode {
    match m {
        GlobalMode::Interactive => wire::GlobalMode::Interactive,
        GlobalMode::Summary => wire::GlobalMode::Summary,
    }
}

fn from_wire_global_mode(m: wire::GlobalMode) -> GlobalMode {
    match m {
        wire::GlobalMode::Interactive => GlobalMode::Interactive,
        wire::GlobalMode::Summary => GlobalMode::Summary,
    }
}

fn to_wire_sim_state(s: SimState) -> wire::SimState {
    match s {
        SimState::Lobby => wire::SimState::Lobby,
        SimState::Running => wire::SimState::Running,
        SimState::Finished => wire::SimState::Finished,
    }
}

fn to_wire_probs(p: [f64; 4]) -> WireProbs {
    WireProbs { p_up: p[0], p_down: p[1], p_left: p[2], p_right: p[3] }
}

fn from_wire_probs(p: WireProbs) -> [f64; 4] {
    [p.p_up, p.p_down, p.p_left, p.p_right]
}

fn build_welcome(server: &Server) -> Welcome {
    server.ctx.with_config(|cfg| Welcome {
        world_kind: to_wire_world_kind(cfg.world_kind),
        size: WireSize { width: cfg.width, height: cfg.height },
        probs: to_wire_probs(cfg.probs),
        k_max_steps: cfg.k_max_steps,
        total_reps: cfg.total_reps,
        current_rep: cfg.current_rep,
        global_mode: to_wire_global_mode(cfg.global_mode),
        origin: wire::WirePos { x: 0, y: 0 },
    })
}

fn build_status(server: &Server, client_id: ClientId) -> Status {
    let can_control = server.ctx.client_can_control(client_id);
    server.ctx.with_config(|cfg| Status {
        world_kind: to_wire_world_kind(cfg.world_kind),
        size: WireSize { width: cfg.width, height: cfg.height },
        probs: to_wire_probs(cfg.probs),
        k_max_steps: cfg.k_max_steps,
        total_reps: cfg.total_reps,
        current_rep: cfg.current_rep,
        global_mode: to_wire_global_mode(cfg.global_mode),
        sim_state: to_wire_sim_state(cfg.sim_state),
        multi_user: cfg.multi_user,
        can_control,
    })
}

fn handle_query_status(server: &Server, client_id: ClientId, stream: &mut UnixStream, payload: &[u8]) {
    if QueryStatus::decode(payload).is_err() {
        send_error(stream, ErrCode::InvalidArgs, "malformed QUERY_STATUS payload");
        return;
    }
    let status = build_status(server, client_id);
    let _ = send_msg(stream, MsgType::Status as u16, &status.encode());
}

fn handle_set_global_mode(server: &Server, client_id: ClientId, stream: &mut UnixStream, payload: &[u8]) {
    let req = match SetGlobalMode::decode(payload) {
        Ok(r) => r,
        Err(_) => {
            send_error(stream, ErrCode::InvalidArgs, "malformed SET_GLOBAL_MODE payload");
            return;
        }
    };
    let mode = from_wire_global_mode(req.new_mode);
    server.ctx.with_config_mut(|cfg| cfg.global_mode = mode);
    send_ack(stream, MsgType::SetGlobalMode);

    let pid = client_pid(server, client_id);
    let changed = GlobalModeChanged { new_mode: req.new_mode, changed_by_pid: pid };
    broadcast(server, MsgType::GlobalModeChanged, &changed.encode());
}

fn client_pid(server: &Server, client_id: ClientId) -> u32 {
    let mut pid = 0u32;
    server.ctx.registry.for_each_client(|c| {
        if c.id == client_id {
            pid = c.pid;
        }
    });
    pid
}

fn probs_sum_valid(probs: [f64; 4]) -> bool {
    let sum: f64 = probs.iter().sum();
    (0.999..=1.001).contains(&sum)
}

fn handle_create_sim(server: &Server, client_id: ClientId, stream: &mut UnixStream, payload: &[u8]) {
    let req = match CreateSim::decode(payload) {
        Ok(r) => r,
        Err(_) => {
            send_error(stream, ErrCode::InvalidArgs, "malformed CREATE_SIM payload");
            return;
        }
    };

    if !server.ctx.client_can_control(client_id) {
        send_error(stream, ErrCode::Permission, "only the owner may create a simulation");
        return;
    }
    if server.ctx.with_config(|cfg| cfg.sim_state) == SimState::Running {
        send_error(stream, ErrCode::Busy, "simulation is currently running");
        return;
    }
    if req.size.width == 0 || req.size.height == 0 || req.total_reps == 0 || req.k_max_steps == 0 {
        send_error(stream, ErrCode::InvalidArgs, "width, height, k, and total_reps must be nonzero");
        return;
    }
    let probs = from_wire_probs(req.probs);
    if !probs_sum_valid(probs) {
        send_error(stream, ErrCode::BadProbabilities, "movement probabilities must sum to 1 within 0.001");
        return;
    }

    let world_kind = from_wire_world_kind(req.world_kind);
    let mut world = match World::new(world_kind, WorldSize { width: req.size.width, height: req.size.height }) {
        Ok(w) => w,
        Err(_) => {
            send_error(stream, ErrCode::CreateSimWorldInit, "failed to construct world");
            return;
        }
    };
    if world_kind == WorldKind::Obstacles {
        world.generate_obstacles(DEFAULT_OBSTACLE_PERCENT, DEFAULT_OBSTACLE_SEED);
        if world.is_obstacle_xy(0, 0) {
            send_error(stream, ErrCode::CreateSimObstacleRegen, "obstacle generation left the origin blocked");
            return;
        }
    }

    server.replace_world(world);
    server.ctx.with_config_mut(|cfg| {
        cfg.world_kind = world_kind;
        cfg.width = req.size.width;
        cfg.height = req.size.height;
        cfg.probs = probs;
        cfg.k_max_steps = req.k_max_steps;
        cfg.total_reps = req.total_reps;
        cfg.current_rep = 0;
        cfg.sim_state = SimState::Lobby;
        cfg.multi_user = req.multi_user;
    });

    send_ack(stream, MsgType::CreateSim);
}

fn handle_load_world(server: &Server, client_id: ClientId, stream: &mut UnixStream, payload: &[u8]) {
    let req = match LoadWorld::decode(payload) {
        Ok(r) => r,
        Err(_) => {
            send_error(stream, ErrCode::InvalidArgs, "malformed LOAD_WORLD payload");
            return;
        }
    };
    if !server.ctx.client_can_control(client_id) {
        send_error(stream, ErrCode::Permission, "only the owner may load a world");
        return;
    }
    if server.ctx.with_config(|cfg| cfg.sim_state) == SimState::Running {
        send_error(stream, ErrCode::Busy, "simulation is currently running");
        return;
    }

    let loaded = match persist::load_world(Path::new(&req.path)) {
        Ok(l) => l,
        Err(_) => {
            send_error(stream, ErrCode::LoadWorldIo, "failed to read world file");
            return;
        }
    };

    let header = loaded.header;
    server.replace_world(loaded.world);
    server.ctx.with_config_mut(|cfg| {
        cfg.world_kind = header.world_kind;
        cfg.width = header.size.width;
        cfg.height = header.size.height;
        cfg.probs = header.probs;
        cfg.k_max_steps = header.k_max_steps;
        cfg.total_reps = header.total_reps;
        cfg.current_rep = 0;
        cfg.sim_state = SimState::Lobby;
        cfg.multi_user = req.multi_user;
    });

    send_ack(stream, MsgType::LoadWorld);
}

fn handle_start_sim(server: &Arc<Server>, client_id: ClientId, stream: &mut UnixStream) {
    if !server.ctx.client_can_control(client_id) {
        send_error(stream, ErrCode::Permission, "only the owner may start a simulation");
        return;
    }
    if server.ctx.with_config(|cfg| cfg.sim_state) == SimState::Running {
        send_error(stream, ErrCode::Busy, "simulation is already running");
        return;
    }

    let (probs, k_max_steps, total_reps) = server.ctx.with_config(|cfg| (cfg.probs, cfg.k_max_steps, cfg.total_reps));
    if total_reps == 0 {
        send_error(stream, ErrCode::InvalidArgs, "no simulation configured");
        return;
    }

    let started = launch_run(server, probs, k_max_steps, total_reps);
    if started {
        send_ack(stream, MsgType::StartSim);
    } else {
        send_error(stream, ErrCode::StartFailed, "failed to start simulation");
    }
}

fn handle_restart_sim(server: &Arc<Server>, client_id: ClientId, stream: &mut UnixStream, payload: &[u8]) {
    let req = match RestartSim::decode(payload) {
        Ok(r) => r,
        Err(_) => {
            send_error(stream, ErrCode::InvalidArgs, "malformed RESTART_SIM payload");
            return;
        }
    };
    if !server.ctx.client_can_control(client_id) {
        send_error(stream, ErrCode::Permission, "only the owner may restart a simulation");
        return;
    }
    if server.ctx.with_config(|cfg| cfg.sim_state) == SimState::Running {
        send_error(stream, ErrCode::Busy, "simulation is already running");
        return;
    }
    if req.total_reps == 0 {
        send_error(stream, ErrCode::InvalidArgs, "total_reps must be nonzero");
        return;
    }

    let (probs, k_max_steps) = server.ctx.with_config(|cfg| (cfg.probs, cfg.k_max_steps));
    server.ctx.with_config_mut(|cfg| cfg.total_reps = req.total_reps);

    let started = launch_run(server, probs, k_max_steps, req.total_reps);
    if started {
        send_ack(stream, MsgType::RestartSim);
    } else {
        send_error(stream, ErrCode::StartFailed, "failed to restart simulation");
    }
}

/// Construct a fresh manager bound to the server's current world/results
/// and start it, wiring its progress/end callbacks back into shared
/// config state and client broadcasts.
fn launch_run(server: &Arc<Server>, probs: [f64; 4], k_max_steps: u32, total_reps: u32) -> bool {
    server.ctx.with_config_mut(|cfg| cfg.sim_state = SimState::Running);

    let mgr = server.new_manager();
    let move_probs = MoveProbs { up: probs[0], down: probs[1], left: probs[2], right: probs[3] };

    let progress_server = Arc::clone(server);
    let on_progress = move |current_rep: u32, total: u32| {
        progress_server.ctx.with_config_mut(|cfg| cfg.current_rep = current_rep);
        let msg = WireProgress { current_rep, total_reps: total };
        broadcast(&progress_server, MsgType::Progress, &msg.encode());
    };

    let end_server = Arc::clone(server);
    let on_end = move |stopped: bool| {
        end_server.ctx.with_config_mut(|cfg| cfg.sim_state = SimState::Finished);
        let reason = if stopped { 1 } else { 0 };
        broadcast(&end_server, MsgType::End, &wire::End { reason }.encode());
    };

    mgr.start(total_reps, move_probs, k_max_steps, on_progress, on_end);
    true
}

fn handle_stop_sim(server: &Server, client_id: ClientId, stream: &mut UnixStream, payload: &[u8]) {
    if StopSim::decode(payload).is_err() {
        send_error(stream, ErrCode::InvalidArgs, "malformed STOP_SIM payload");
        return;
    }
    if !server.ctx.client_can_control(client_id) {
        send_error(stream, ErrCode::Permission, "only the owner may stop the simulation");
        return;
    }
    match server.manager() {
        Some(mgr) => {
            mgr.request_stop();
            send_ack(stream, MsgType::StopSim);
        }
        None => send_error(stream, ErrCode::MissingManager, "no simulation has been started"),
    }
}

fn handle_request_snapshot(server: &Server, _client_id: ClientId, stream: &mut UnixStream, payload: &[u8]) {
    if RequestSnapshot::decode(payload).is_err() {
        send_error(stream, ErrCode::InvalidArgs, "malformed REQUEST_SNAPSHOT payload");
        return;
    }

    let world = server.world();
    let results = server.results();
    if world.cell_count() == 0 {
        send_error(stream, ErrCode::SnapshotPrecondition, "no world to snapshot");
        return;
    }

    let snapshot_id = server.next_snapshot_id();
    let (begin, chunks) = snapshot::build(&world, &results, snapshot_id, &Field::ALL);

    let wire_begin = wire::SnapshotBegin {
        snapshot_id: begin.snapshot_id,
        size: WireSize { width: world.size.width, height: world.size.height },
        world_kind: to_wire_world_kind(world.kind),
        cell_count: begin.cell_count,
        included_fields: begin.included_fields,
    };
    if send_msg(stream, MsgType::SnapshotBegin as u16, &wire_begin.encode()).is_err() {
        return;
    }

    for chunk in chunks {
        let wire_chunk = wire::SnapshotChunk {
            snapshot_id,
            field: chunk.field.wire_id(),
            offset_bytes: chunk.offset_bytes,
            data: chunk.data,
        };
        if send_msg(stream, MsgType::SnapshotChunk as u16, &wire_chunk.encode()).is_err() {
            send_error(stream, ErrCode::SnapshotSendFailed, "snapshot stream interrupted");
            return;
        }
    }

    let _ = send_msg(stream, MsgType::SnapshotEnd as u16, &[]);
}

fn handle_save_results(server: &Server, client_id: ClientId, stream: &mut UnixStream, payload: &[u8]) {
    let req = match SaveResults::decode(payload) {
        Ok(r) => r,
        Err(_) => {
            send_error(stream, ErrCode::InvalidArgs, "malformed SAVE_RESULTS payload");
            return;
        }
    };
    if !server.ctx.client_can_control(client_id) {
        send_error(stream, ErrCode::Permission, "only the owner may save results");
        return;
    }

    let world = server.world();
    let results = server.results();
    let header = server.ctx.with_config(|cfg| Header {
        world_kind: cfg.world_kind,
        size: WorldSize { width: cfg.width, height: cfg.height },
        probs: cfg.probs,
        k_max_steps: cfg.k_max_steps,
        total_reps: cfg.total_reps,
    });

    match persist::save_results(Path::new(&req.path), &header, &world, &results) {
        Ok(()) => send_ack(stream, MsgType::SaveResults),
        Err(_) => send_error(stream, ErrCode::SaveResultsIo, "failed to write results file"),
    }
}

fn handle_load_results(server: &Server, client_id: ClientId, stream: &mut UnixStream, payload: &[u8]) {
    let req = match LoadResults::decode(payload) {
        Ok(r) => r,
        Err(_) => {
            send_error(stream, ErrCode::InvalidArgs, "malformed LOAD_RESULTS payload");
            return;
        }
    };
    if !server.ctx.client_can_control(client_id) {
        send_error(stream, ErrCode::Permission, "only the owner may load results");
        return;
    }

    let loaded = match persist::load_results(Path::new(&req.path)) {
        Ok(l) => l,
        Err(_) => {
            send_error(stream, ErrCode::LoadResultsIo, "failed to read results file");
            return;
        }
    };

    let header = loaded.header;
    let cell_count = loaded.world.cell_count();
    let results = crate::results::Results::new(cell_count);
    results.load(&loaded.trials, &loaded.sum_steps, &loaded.success_leq_k);
    server.replace_world_and_results(loaded.world, results);
    server.ctx.with_config_mut(|cfg| {
        cfg.world_kind = header.world_kind;
        cfg.width = header.size.width;
        cfg.height = header.size.height;
        cfg.probs = header.probs;
        cfg.k_max_steps = header.k_max_steps;
        cfg.total_reps = header.total_reps;
        cfg.current_rep = header.total_reps;
        cfg.sim_state = SimState::Finished;
    });

    send_ack(stream, MsgType::LoadResults);
}

fn handle_quit(server: &Arc<Server>, client_id: ClientId, stream: &mut UnixStream, payload: &[u8]) {
    let req = match Quit::decode(payload) {
        Ok(r) => r,
        Err(_) => {
            send_error(stream, ErrCode::InvalidArgs, "malformed QUIT payload");
            return;
        }
    };

    if req.stop_if_owner && server.ctx.registry.owner() == Some(client_id) {
        if let Some(mgr) = server.manager() {
            mgr.request_stop();
        }
    }

    send_ack(stream, MsgType::Quit);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::WorldKind;
    use rw_protocol::frame::{recv_hdr, recv_payload, send_msg};
    use rw_protocol::wire::{Join, MsgType, Welcome};
    use std::os::unix::net::UnixStream as Stream;
    use std::time::Duration;

    fn spawn_server(world_kind: WorldKind, w: u32, h: u32) -> Arc<Server> {
        Arc::new(Server::new(world_kind, w, h, 2, 64))
    }

    fn join_and_welcome(server: &Arc<Server>) -> (Stream, std::thread::JoinHandle<()>) {
        let (mut client, server_sock) = Stream::pair().unwrap();
        let server = Arc::clone(server);
        let handle = std::thread::spawn(move || run_session(server, server_sock));

        let join = Join { pid: 42 };
        send_msg(&mut client, MsgType::Join as u16, &join.encode()).unwrap();
        let hdr = recv_hdr(&mut client).unwrap();
        assert_eq!(hdr.msg_type, MsgType::Welcome as u16);
        let payload = recv_payload(&mut client, hdr.payload_len).unwrap();
        Welcome::decode(&payload).unwrap();

        (client, handle)
    }

    #[test]
    fn handshake_then_quit_closes_cleanly() {
        let server = spawn_server(WorldKind::Wrap, 3, 3);
        let (mut client, handle) = join_and_welcome(&server);

        let quit = Quit { pid: 42, stop_if_owner: false };
        send_msg(&mut client, MsgType::Quit as u16, &quit.encode()).unwrap();
        let hdr = recv_hdr(&mut client).unwrap();
        assert_eq!(hdr.msg_type, MsgType::Ack as u16);

        handle.join().unwrap();
        assert_eq!(server.ctx.registry.len(), 0);
    }

    #[test]
    fn query_status_reports_owner_control() {
        let server = spawn_server(WorldKind::Wrap, 2, 2);
        let (mut client, _handle) = join_and_welcome(&server);

        let req = QueryStatus { pid: 42 };
        send_msg(&mut client, MsgType::QueryStatus as u16, &req.encode()).unwrap();
        let hdr = recv_hdr(&mut client).unwrap();
        assert_eq!(hdr.msg_type, MsgType::Status as u16);
        let payload = recv_payload(&mut client, hdr.payload_len).unwrap();
        let status = Status::decode(&payload).unwrap();
        assert!(status.can_control);

        let quit = Quit { pid: 42, stop_if_owner: false };
        send_msg(&mut client, MsgType::Quit as u16, &quit.encode()).unwrap();
        let _ = recv_hdr(&mut client);
    }

    #[test]
    fn create_sim_rejects_bad_probabilities() {
        let server = spawn_server(WorldKind::Wrap, 4, 4);
        let (mut client, _handle) = join_and_welcome(&server);

        let req = CreateSim {
            world_kind: wire::WorldKind::Wrap,
            size: WireSize { width: 4, height: 4 },
            probs: WireProbs { p_up: 0.5, p_down: 0.5, p_left: 0.5, p_right: 0.5 },
            k_max_steps: 10,
            total_reps: 1,
            multi_user: false,
        };
        send_msg(&mut client, MsgType::CreateSim as u16, &req.encode()).unwrap();
        let hdr = recv_hdr(&mut client).unwrap();
        assert_eq!(hdr.msg_type, MsgType::Error as u16);
        let payload = recv_payload(&mut client, hdr.payload_len).unwrap();
        let err = WireError::decode(&payload).unwrap();
        assert_eq!(err.code, ErrCode::BadProbabilities as u32);
    }

    #[test]
    fn full_create_start_wait_for_end() {
        let server = spawn_server(WorldKind::Wrap, 2, 2);
        let (mut client, _handle) = join_and_welcome(&server);

        let create = CreateSim {
            world_kind: wire::WorldKind::Wrap,
            size: WireSize { width: 2, height: 2 },
            probs: WireProbs { p_up: 0.25, p_down: 0.25, p_left: 0.25, p_right: 0.25 },
            k_max_steps: 10,
            total_reps: 2,
            multi_user: false,
        };
        send_msg(&mut client, MsgType::CreateSim as u16, &create.encode()).unwrap();
        let hdr = recv_hdr(&mut client).unwrap();
        assert_eq!(hdr.msg_type, MsgType::Ack as u16);

        send_msg(&mut client, MsgType::StartSim as u16, &[]).unwrap();
        let hdr = recv_hdr(&mut client).unwrap();
        assert_eq!(hdr.msg_type, MsgType::Ack as u16);

        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut saw_end = false;
        for _ in 0..100 {
            let hdr = match recv_hdr(&mut client) {
                Ok(h) => h,
                Err(_) => break,
            };
            let payload = recv_payload(&mut client, hdr.payload_len).unwrap();
            if hdr.msg_type == MsgType::End as u16 {
                let end = wire::End::decode(&payload).unwrap();
                assert_eq!(end.reason, 0);
                saw_end = true;
                break;
            }
        }
        assert!(saw_end, "expected an END notification after the run completed");
    }
}
