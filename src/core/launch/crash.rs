// ─── Crash Classifier ───
// Maps the tail of a crashed game's log to a known cause. Signatures are
// checked in order and the first match wins.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrashCause {
    OutOfMemory,
    JavaVersionMismatch,
    ModLoaderInjection,
    ModDependencyConflict,
    MissingNatives,
    CorruptedLibrary,
    GraphicsDriver,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrashReport {
    pub cause: CrashCause,
    pub details: String,
    pub suggestion: String,
    pub is_detected: bool,
    pub exit_code: Option<i32>,
}

/// Windows status codes for access violations inside the graphics driver.
const DRIVER_EXIT_CODES: [i32; 3] = [-1073740791, -1073741819, -805306369];

struct Signature {
    cause: CrashCause,
    patterns: &'static [&'static str],
    details: &'static str,
    suggestion: &'static str,
}

const SIGNATURES: &[Signature] = &[
    Signature {
        cause: CrashCause::OutOfMemory,
        patterns: &[
            "java.lang.OutOfMemoryError",
            "GC overhead limit exceeded",
            "Could not reserve enough space for object heap",
        ],
        details: "The game ran out of memory.",
        suggestion: "Increase the maximum memory for this instance or remove heavy mods.",
    },
    Signature {
        cause: CrashCause::JavaVersionMismatch,
        patterns: &[
            "UnsupportedClassVersionError",
            "has been compiled by a more recent version of the Java Runtime",
            "Unsupported class file major version",
            "requires Java",
        ],
        details: "The selected Java runtime does not match what this version needs.",
        suggestion: "Remove the custom Java path so the launcher picks the required runtime.",
    },
    Signature {
        cause: CrashCause::ModLoaderInjection,
        patterns: &[
            "MixinApplyError",
            "Mixin apply failed",
            "InvalidInjectionException",
            "cpw.mods.modlauncher.InvalidLauncherSetupException",
            "net.fabricmc.loader.impl.FormattedException",
        ],
        details: "The mod loader failed while patching game classes.",
        suggestion: "Update or remove the mod named in the log; it is likely built for another game version.",
    },
    Signature {
        cause: CrashCause::ModDependencyConflict,
        patterns: &[
            "Missing or unsupported mandatory dependencies",
            "Incompatible mods found",
            "ModResolutionException",
            "DuplicateModsFoundException",
        ],
        details: "Installed mods have missing or conflicting dependencies.",
        suggestion: "Install the missing dependencies or remove duplicate mods.",
    },
    Signature {
        cause: CrashCause::MissingNatives,
        patterns: &[
            "UnsatisfiedLinkError",
            "no lwjgl in java.library.path",
            "Failed to locate library",
        ],
        details: "Native libraries could not be loaded.",
        suggestion: "Launch again to re-extract natives; check that the Java architecture matches the system.",
    },
    Signature {
        cause: CrashCause::CorruptedLibrary,
        patterns: &[
            "ZipException: zip END header not found",
            "java.util.zip.ZipException",
            "Invalid or corrupt jarfile",
        ],
        details: "A library or the client jar is damaged.",
        suggestion: "Delete the jar named in the log so it is downloaded again.",
    },
    Signature {
        cause: CrashCause::GraphicsDriver,
        patterns: &[
            "EXCEPTION_ACCESS_VIOLATION",
            "atio6axx.dll",
            "ig9icd64.dll",
            "nvoglv64.dll",
            "GLFW error 65542",
            "Pixel format not accelerated",
        ],
        details: "The graphics driver crashed.",
        suggestion: "Update the graphics driver and disable overlays.",
    },
];

/// Classify a nonzero exit from its captured log lines.
pub fn classify_crash<S: AsRef<str>>(exit_code: Option<i32>, lines: &[S]) -> CrashReport {
    for signature in SIGNATURES {
        let hit = lines.iter().map(AsRef::as_ref).find(|line| {
            signature
                .patterns
                .iter()
                .any(|pattern| line.contains(pattern))
        });
        let by_exit_code = signature.cause == CrashCause::GraphicsDriver
            && exit_code.is_some_and(|code| DRIVER_EXIT_CODES.contains(&code));

        if hit.is_some() || by_exit_code {
            let details = match hit {
                Some(line) => format!("{} ({})", signature.details, line.trim()),
                None => signature.details.to_string(),
            };
            return CrashReport {
                cause: signature.cause,
                details,
                suggestion: signature.suggestion.to_string(),
                is_detected: true,
                exit_code,
            };
        }
    }

    let code = exit_code.map_or_else(|| "none".to_string(), |c| c.to_string());
    CrashReport {
        cause: CrashCause::Unknown,
        details: format!("The game exited unexpectedly (exit code {code})."),
        suggestion: "Check the log for the first error and share it when asking for help.".into(),
        is_detected: false,
        exit_code,
    }
}
