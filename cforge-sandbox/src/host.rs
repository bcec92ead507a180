//! WebAssembly execution host using wasmtime
//!
//! Grants a module exactly two capabilities from the `env` namespace: a
//! linear memory and an empty indirect-call table. With stdout capture
//! enabled, WASI preview1 is linked against an in-memory context that has
//! no preopened directories, arguments, or environment, so `printf` output
//! is collected and everything else fails inside the guest.

use crate::error::{Result, SandboxError};
use crate::limits::SandboxLimits;
use crate::types::{ExecutionResult, EXECUTION_TIMED_OUT, MISSING_ENTRY_POINT};
use base64::{engine::general_purpose, Engine as _};
use cforge_common::SandboxConfig;
use std::time::Instant;
use tracing::{debug, info, warn};
use wasmtime::*;
use wasmtime_wasi::preview1::{add_to_linker_async, WasiP1Ctx};
use wasmtime_wasi::{pipe::MemoryOutputPipe, I32Exit, WasiCtxBuilder};

/// Import namespace holding the host-provided memory and table
pub const ENV_MODULE: &str = "env";

/// Import namespace of WASI preview1
pub const WASI_MODULE: &str = "wasi_snapshot_preview1";

/// Largest indirect-call table a module may import
const MAX_TABLE_ELEMENTS: u64 = 65_536;

/// Fuel consumed between cooperative yields to the async runtime
const FUEL_YIELD_INTERVAL: u64 = 10_000;

// Store state for one execution
struct HostState {
    wasi: WasiP1Ctx,
    limits: StoreLimits,
}

/// Runs transported artifacts under fuel, memory, and wall-clock bounds
#[derive(Clone)]
pub struct ExecutionHost {
    /// Wasmtime engine (shared across executions)
    engine: Engine,
    limits: SandboxLimits,
    entry_points: Vec<String>,
    capture_stdout: bool,
}

impl ExecutionHost {
    /// Create a host from the `[sandbox]` configuration section
    pub fn new(config: &SandboxConfig) -> Result<Self> {
        Ok(Self::with_limits(SandboxLimits::from(config))?
            .with_entry_points(config.entry_points.clone())
            .with_stdout_capture(config.capture_stdout))
    }

    /// Create a host with custom resource limits and default entry points
    pub fn with_limits(limits: SandboxLimits) -> Result<Self> {
        let mut config = Config::new();
        config.wasm_backtrace_details(WasmBacktraceDetails::Enable);
        config.async_support(true);
        config.consume_fuel(true);

        let engine = Engine::new(&config).map_err(|e| SandboxError::Engine(e.to_string()))?;

        Ok(Self {
            engine,
            limits,
            entry_points: SandboxConfig::default().entry_points,
            capture_stdout: true,
        })
    }

    /// Export names tried, in order, as the program entry point
    pub fn with_entry_points(mut self, entry_points: Vec<String>) -> Self {
        self.entry_points = entry_points;
        self
    }

    pub fn with_stdout_capture(mut self, capture: bool) -> Self {
        self.capture_stdout = capture;
        self
    }

    pub fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    /// Decode a transported artifact and run it
    pub async fn run(&self, encoded: &str) -> Result<ExecutionResult> {
        let bytes = decode_artifact(encoded)?;
        self.run_bytes(&bytes).await
    }

    /// Instantiate a module and invoke its entry point once
    pub async fn run_bytes(&self, bytes: &[u8]) -> Result<ExecutionResult> {
        let start = Instant::now();

        let module = Module::from_binary(&self.engine, bytes)
            .map_err(|e| SandboxError::Instantiation(format!("invalid module: {e}")))?;

        let stdout = MemoryOutputPipe::new(self.limits.max_capture_bytes);
        let mut store = self.new_store(stdout.clone())?;
        let linker = self.link(&mut store, &module).await?;

        let mut result =
            match tokio::time::timeout(self.limits.timeout, self.execute(&mut store, &linker, &module)).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(timeout = ?self.limits.timeout, "Execution timed out");
                    ExecutionResult::trapped(EXECUTION_TIMED_OUT)
                }
            };

        if self.capture_stdout {
            result.stdout_capture = Some(String::from_utf8_lossy(&stdout.contents()).into_owned());
        }
        result.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            exit_code = ?result.exit_code,
            trap = ?result.trap,
            duration_ms = result.duration_ms,
            "Execution finished"
        );
        Ok(result)
    }

    fn new_store(&self, stdout: MemoryOutputPipe) -> Result<Store<HostState>> {
        let mut builder = WasiCtxBuilder::new();
        builder.stdout(stdout.clone());
        builder.stderr(stdout);

        let limits = StoreLimitsBuilder::new()
            .memory_size(self.limits.max_memory_bytes())
            .instances(8)
            .memories(8)
            .tables(8)
            .build();

        let mut store = Store::new(
            &self.engine,
            HostState {
                wasi: builder.build_p1(),
                limits,
            },
        );
        store.limiter(|state| &mut state.limits);
        store
            .set_fuel(self.limits.fuel)
            .map_err(|e| SandboxError::Engine(e.to_string()))?;
        store
            .fuel_async_yield_interval(Some(FUEL_YIELD_INTERVAL))
            .map_err(|e| SandboxError::Engine(e.to_string()))?;
        Ok(store)
    }

    /// Build a linker that satisfies exactly the imports the module declares
    async fn link(&self, store: &mut Store<HostState>, module: &Module) -> Result<Linker<HostState>> {
        let mut linker = Linker::new(&self.engine);

        if self.capture_stdout {
            add_to_linker_async(&mut linker, |s: &mut HostState| &mut s.wasi)
                .map_err(|e| SandboxError::Engine(e.to_string()))?;
        }

        for import in module.imports() {
            let (module_name, name) = (import.module(), import.name());
            match (module_name, name, import.ty()) {
                (ENV_MODULE, "memory", ExternType::Memory(ty)) => {
                    let memory = Memory::new_async(&mut *store, self.memory_type(&ty)?)
                        .await
                        .map_err(|e| SandboxError::Instantiation(format!("env.memory: {e}")))?;
                    linker
                        .define(&mut *store, ENV_MODULE, "memory", memory)
                        .map_err(|e| SandboxError::Instantiation(e.to_string()))?;
                }
                (ENV_MODULE, "table", ExternType::Table(ty)) => {
                    if u64::from(ty.minimum()) > MAX_TABLE_ELEMENTS {
                        return Err(SandboxError::Instantiation(format!(
                            "env.table requires {} elements, limit is {MAX_TABLE_ELEMENTS}",
                            ty.minimum()
                        )));
                    }
                    let table = Table::new_async(&mut *store, ty, Ref::Func(None))
                        .await
                        .map_err(|e| SandboxError::Instantiation(format!("env.table: {e}")))?;
                    linker
                        .define(&mut *store, ENV_MODULE, "table", table)
                        .map_err(|e| SandboxError::Instantiation(e.to_string()))?;
                }
                (WASI_MODULE, _, _) if self.capture_stdout => {}
                _ => {
                    return Err(SandboxError::Instantiation(format!(
                        "unsupported import {module_name}.{name}"
                    )));
                }
            }
        }

        Ok(linker)
    }

    /// Shape the host memory to fit both the declared import and the limits
    fn memory_type(&self, declared: &MemoryType) -> Result<MemoryType> {
        if declared.is_64() || declared.is_shared() {
            return Err(SandboxError::Instantiation(
                "env.memory must be a 32-bit unshared memory".to_string(),
            ));
        }

        let max_pages = self.limits.max_memory_pages;
        let minimum = u32::try_from(declared.minimum()).unwrap_or(u32::MAX);
        if minimum > max_pages {
            return Err(SandboxError::Instantiation(format!(
                "env.memory requires {minimum} pages, limit is {max_pages}"
            )));
        }

        let ceiling = declared
            .maximum()
            .map(|m| u32::try_from(m).unwrap_or(u32::MAX).min(max_pages))
            .unwrap_or(max_pages);
        let initial = minimum.max(self.limits.initial_memory_pages).min(ceiling);

        Ok(MemoryType::new(initial, Some(ceiling)))
    }

    async fn execute(
        &self,
        store: &mut Store<HostState>,
        linker: &Linker<HostState>,
        module: &Module,
    ) -> Result<ExecutionResult> {
        let instance = match linker.instantiate_async(&mut *store, module).await {
            Ok(instance) => instance,
            // A start function that traps or exits is a program outcome.
            Err(e) => {
                return guest_outcome(&e).ok_or_else(|| SandboxError::Instantiation(e.to_string()));
            }
        };

        let Some((entry, func)) = self.find_entry(store, &instance) else {
            debug!(candidates = ?self.entry_points, "No callable entry point");
            return Ok(ExecutionResult::trapped(MISSING_ENTRY_POINT));
        };

        let ty = func.ty(&*store);
        let params: Vec<Val> = ty.params().filter_map(|p| zero_value(&p)).collect();
        let mut results: Vec<Val> = ty
            .results()
            .map(|r| zero_value(&r).unwrap_or(Val::I32(0)))
            .collect();

        debug!(entry = %entry, params = params.len(), "Calling entry point");
        match func.call_async(&mut *store, &params, &mut results).await {
            Ok(()) => Ok(ExecutionResult::exited(exit_code_of(results.first()))),
            Err(e) => Ok(guest_outcome(&e).unwrap_or_else(|| ExecutionResult::trapped(format!("{e:#}")))),
        }
    }

    /// First configured export that is a function taking only numbers
    fn find_entry(&self, store: &mut Store<HostState>, instance: &Instance) -> Option<(String, Func)> {
        for name in &self.entry_points {
            let Some(func) = instance.get_func(&mut *store, name) else {
                continue;
            };
            if func.ty(&*store).params().all(|p| zero_value(&p).is_some()) {
                return Some((name.clone(), func));
            }
            debug!(entry = %name, "Entry point has non-numeric parameters");
        }
        None
    }
}

/// Decode the transport encoding produced by the compile service
pub fn decode_artifact(encoded: &str) -> Result<Vec<u8>> {
    Ok(general_purpose::STANDARD.decode(encoded.trim())?)
}

fn zero_value(ty: &ValType) -> Option<Val> {
    match ty {
        ValType::I32 => Some(Val::I32(0)),
        ValType::I64 => Some(Val::I64(0)),
        ValType::F32 => Some(Val::F32(0)),
        ValType::F64 => Some(Val::F64(0)),
        _ => None,
    }
}

fn exit_code_of(result: Option<&Val>) -> i32 {
    match result {
        Some(Val::I32(code)) => *code,
        Some(Val::I64(code)) => *code as i32,
        _ => 0,
    }
}

/// Map a guest-caused failure to a result; `None` for host-side errors
fn guest_outcome(err: &Error) -> Option<ExecutionResult> {
    if let Some(exit) = err.downcast_ref::<I32Exit>() {
        return Some(ExecutionResult::exited(exit.0));
    }
    err.downcast_ref::<Trap>()
        .map(|trap| ExecutionResult::trapped(trap.to_string()))
}
