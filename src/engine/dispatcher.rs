//! 断点命令调度状态机
//!
//! 附加到目标后循环执行：继续运行 -> 解析停止应答 -> 读取断点指令 -> 分类 -> 执行 -> 跳过断点。
//! 可恢复的问题只记录日志，只有传输层错误会结束会话并向上传播。

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::classify::{BreakpointCommand, classify};
use super::copier::CopyJob;
use super::host::{Host, HostError};
use super::instruction::{extract_immediate, fetch_instruction_word};
use super::policy::{AllocationMode, DispatchPolicy, StreakReset, TerminationMode};
use crate::const_values::{INSTRUCTION_SIZE, PC_REGISTER, X0_REGISTER};
use crate::protocol::{Command, StopEvent};
use crate::transport::{Transport, TransportError};
use crate::utils::Arm64Disassembler;

/// 调度引擎错误
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Host(#[from] HostError),
}

/// 状态机状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Unattached,
    Attached,
    /// 已发送 `c`，等待停止应答
    Continuing,
    /// 正在处理一次停止事件
    Dispatching,
    Detached,
}

/// 会话结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// 目标通过 BRK 请求断开
    DetachRequested,
    /// 连续无效断点达到上限
    StreakCeiling,
    /// 已处理满指定次数的 MapPage
    CountReached,
}

/// 会话计数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Session {
    pub process_id: u32,
    pub attached: bool,
    pub invalid_streak: u32,
    pub valid_count: u32,
    /// 完成的 MapPage 次数，bounded-count 模式按它计数
    pub mapped_count: u32,
    /// 收到的停止应答总数
    pub stops: u32,
}

/// 会话结束后的汇总
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub process_id: u32,
    pub valid_count: u32,
    pub mapped_count: u32,
    pub invalid_streak: u32,
    pub stops: u32,
    pub termination: Termination,
}

/// 单次停止事件处理后的走向
enum Flow {
    Resume,
    Detach,
}

/// 断点命令调度器
pub struct Dispatcher<T, H> {
    transport: T,
    host: H,
    policy: DispatchPolicy,
    state: DispatchState,
    session: Session,
    /// 仅用于调试日志，创建失败时为 None
    disassembler: Option<Arm64Disassembler>,
}

impl<T: Transport, H: Host> Dispatcher<T, H> {
    pub fn new(transport: T, host: H, policy: DispatchPolicy) -> Self {
        Self {
            transport,
            host,
            policy,
            state: DispatchState::Unattached,
            session: Session::default(),
            disassembler: Arm64Disassembler::new()
                .inspect_err(|e| warn!("无法创建反汇编器: {}", e))
                .ok(),
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    pub fn into_parts(self) -> (T, H) {
        (self.transport, self.host)
    }

    /// 按进程 ID 附加到目标
    pub fn attach(&mut self) -> Result<(), EngineError> {
        let pid = self.host.target_process_id()?;
        info!(pid, "附加到目标进程");
        let reply = self.transport.send(&Command::Attach { pid }.to_string())?;
        info!(reply = %reply, "attach 应答");

        self.session = Session {
            process_id: pid,
            attached: true,
            ..Default::default()
        };
        self.state = DispatchState::Attached;
        Ok(())
    }

    /// 附加（如果尚未附加）并运行到会话结束
    pub fn run(&mut self) -> Result<SessionReport, EngineError> {
        if self.state == DispatchState::Unattached {
            self.attach()?;
        }

        let termination = self.dispatch_loop()?;
        self.detach()?;

        let report = SessionReport {
            process_id: self.session.process_id,
            valid_count: self.session.valid_count,
            mapped_count: self.session.mapped_count,
            invalid_streak: self.session.invalid_streak,
            stops: self.session.stops,
            termination,
        };
        info!(?report, "会话结束");
        Ok(report)
    }

    fn dispatch_loop(&mut self) -> Result<Termination, EngineError> {
        loop {
            if let Some(termination) = self.termination_reached() {
                return Ok(termination);
            }

            self.state = DispatchState::Continuing;
            let reply = self.transport.send(&Command::Continue.to_string())?;
            self.session.stops += 1;
            debug!(stop = self.session.stops, reply = %reply, "收到停止应答");

            self.state = DispatchState::Dispatching;
            if let Flow::Detach = self.dispatch(&reply)? {
                return Ok(Termination::DetachRequested);
            }
        }
    }

    fn termination_reached(&self) -> Option<Termination> {
        match self.policy.termination {
            TerminationMode::BoundedCount { count } => {
                (self.session.mapped_count >= count).then_some(Termination::CountReached)
            }
            TerminationMode::UnboundedWithCeiling { ceiling } => {
                if self.session.invalid_streak >= ceiling {
                    error!(
                        streak = self.session.invalid_streak,
                        "连续无效断点过多，强制断开"
                    );
                    Some(Termination::StreakCeiling)
                } else {
                    None
                }
            }
        }
    }

    fn dispatch(&mut self, reply: &str) -> Result<Flow, EngineError> {
        let event = match StopEvent::parse(reply) {
            Ok(event) => event,
            Err(e) => {
                self.record_invalid(format_args!("停止应答无法使用: {}", e));
                return Ok(Flow::Resume);
            }
        };
        debug!(
            tid = %event.thread_id,
            pc = format_args!("{:#x}", event.program_counter),
            x0 = format_args!("{:#x}", event.x0()),
            x1 = ?event.x1(),
            x2 = ?event.x2(),
            "解析停止事件"
        );

        let Some(word) = fetch_instruction_word(
            &mut self.transport,
            event.program_counter,
            self.disassembler.as_ref(),
        )?
        else {
            self.record_invalid(format_args!("无法读取断点指令"));
            return Ok(Flow::Resume);
        };
        let immediate = extract_immediate(word);
        let command = BreakpointCommand::from_event(classify(immediate), &event);
        debug!(kind = ?command.kind(), immediate = format_args!("{:#x}", immediate), "断点分类");

        match command {
            BreakpointCommand::Invalid => {
                // 不推进 PC，下一次继续运行时会再次停在这里
                self.record_invalid(format_args!("未知的 BRK 立即数 {:#x}", immediate));
                Ok(Flow::Resume)
            }
            BreakpointCommand::Detach => {
                if self.policy.streak_reset == StreakReset::AnyRecognized {
                    self.session.invalid_streak = 0;
                }
                info!("目标请求断开会话");
                Ok(Flow::Detach)
            }
            BreakpointCommand::MapPage { address, size } => {
                if !self.map_page(&event, address, size)? {
                    // 不推进 PC，目标会再次触发同一个断点重新申请
                    self.record_invalid(format_args!("RX 内存申请失败"));
                    return Ok(Flow::Resume);
                }
                self.record_valid();
                self.session.mapped_count += 1;
                self.advance_pc(&event)?;
                Ok(Flow::Resume)
            }
            BreakpointCommand::PatchMemory { dest, src, size } => {
                self.record_valid();
                self.patch_memory(dest, src, size)?;
                self.advance_pc(&event)?;
                Ok(Flow::Resume)
            }
        }
    }

    fn record_invalid(&mut self, reason: std::fmt::Arguments<'_>) {
        self.session.invalid_streak += 1;
        warn!(streak = self.session.invalid_streak, "跳过无效断点: {}", reason);
    }

    fn record_valid(&mut self) {
        self.session.invalid_streak = 0;
        self.session.valid_count += 1;
    }

    /// 处理 MapPage，没有拿到可用地址时返回 `false`
    fn map_page(&mut self, event: &StopEvent, address: u64, size: u64) -> Result<bool, EngineError> {
        let region = match self.policy.allocation {
            AllocationMode::InPlace => Some((address, size)),
            AllocationMode::RequestRx => {
                let requested = event.x0();
                self.allocate_rx(requested)?.map(|allocated| (allocated, requested))
            }
        };
        let Some((address, size)) = region else {
            return Ok(false);
        };

        info!(
            address = format_args!("{:#x}", address),
            size = format_args!("{:#x}", size),
            "准备 JIT 内存区域"
        );
        if let Err(e) = self.host.prepare_memory_region(address, size) {
            // TODO: 增加策略开关，允许 prepare 失败时直接断开
            error!("准备内存区域失败，继续执行: {}", e);
        }

        if self.policy.report_allocation_in_x0 {
            self.write_register(X0_REGISTER, address, &event.thread_id)?;
        }
        Ok(true)
    }

    /// 向调试服务器申请 RX 内存，返回分配到的地址
    fn allocate_rx(&mut self, size: u64) -> Result<Option<u64>, EngineError> {
        let reply = self.transport.send(&Command::AllocateRx { size }.to_string())?;
        match u64::from_str_radix(&reply, 16) {
            Ok(address) if !reply.starts_with('E') => {
                info!(address = format_args!("{:#x}", address), "已分配 RX 内存");
                Ok(Some(address))
            }
            _ => {
                warn!(reply = %reply, size = format_args!("{:#x}", size), "申请 RX 内存失败");
                Ok(None)
            }
        }
    }

    fn patch_memory(
        &mut self,
        dest: u64,
        src: Option<u64>,
        size: Option<u64>,
    ) -> Result<(), EngineError> {
        let (Some(src), Some(size)) = (src, size) else {
            warn!(?src, ?size, "PatchMemory 缺少 x1 或 x2，跳过拷贝");
            return Ok(());
        };

        let outcome = CopyJob::new(dest, src, size).run(&mut self.transport)?;
        debug!(?outcome, "PatchMemory 处理完成");
        Ok(())
    }

    /// 把 PC 设置到断点指令之后
    fn advance_pc(&mut self, event: &StopEvent) -> Result<(), EngineError> {
        let next_pc = event.program_counter + INSTRUCTION_SIZE;
        self.write_register(PC_REGISTER, next_pc, &event.thread_id)
    }

    fn write_register(&mut self, index: u8, value: u64, thread_id: &str) -> Result<(), EngineError> {
        let command = Command::WriteRegister {
            index,
            value,
            thread_id,
        };
        let reply = self.transport.send(&command.to_string())?;
        if reply.starts_with('E') {
            warn!(register = index, reply = %reply, "写寄存器失败");
        } else {
            debug!(register = index, value = format_args!("{:#x}", value), reply = %reply, "写寄存器");
        }
        Ok(())
    }

    fn detach(&mut self) -> Result<(), EngineError> {
        let reply = self.transport.send(&Command::Detach.to_string())?;
        info!(reply = %reply, "detach 应答");
        self.session.attached = false;
        self.state = DispatchState::Detached;
        Ok(())
    }
}
