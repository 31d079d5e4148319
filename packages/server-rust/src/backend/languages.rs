//! Compile commands for the languages that need a build step.

use std::path::Path;

use judge_dispatch_core::Language;

use super::toolchain::Toolchain;

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// GNU C++ toolchain.
#[derive(Debug, Clone)]
pub struct CppToolchain {
    pub compiler: String,
}

impl Default for CppToolchain {
    fn default() -> Self {
        Self {
            compiler: "g++".to_string(),
        }
    }
}

impl Toolchain for CppToolchain {
    fn name(&self) -> &'static str {
        "g++"
    }

    fn language(&self) -> Language {
        Language::Cpp
    }

    fn source_file(&self) -> &'static str {
        "solution.cpp"
    }

    fn artifact_file(&self) -> &'static str {
        "solution"
    }

    fn compile_command(&self, workdir: &Path) -> Vec<String> {
        vec![
            self.compiler.clone(),
            "-std=c++17".to_string(),
            "-O2".to_string(),
            "-pipe".to_string(),
            "-o".to_string(),
            path_arg(&workdir.join(self.artifact_file())),
            path_arg(&workdir.join(self.source_file())),
        ]
    }
}

/// JDK compiler. Submissions must declare a public `Main` class.
#[derive(Debug, Clone)]
pub struct JavaToolchain {
    pub compiler: String,
}

impl Default for JavaToolchain {
    fn default() -> Self {
        Self {
            compiler: "javac".to_string(),
        }
    }
}

impl Toolchain for JavaToolchain {
    fn name(&self) -> &'static str {
        "javac"
    }

    fn language(&self) -> Language {
        Language::Java
    }

    fn source_file(&self) -> &'static str {
        "Main.java"
    }

    fn artifact_file(&self) -> &'static str {
        "Main.class"
    }

    fn compile_command(&self, workdir: &Path) -> Vec<String> {
        vec![
            self.compiler.clone(),
            "-encoding".to_string(),
            "UTF-8".to_string(),
            "-d".to_string(),
            path_arg(workdir),
            path_arg(&workdir.join(self.source_file())),
        ]
    }
}
