//! Evaluate a Jsonnet file and print the resulting JSON.
//!
//! Usage: `eval <file.jsonnet> [name=value ...]`
//!
//! Each `name=value` argument becomes an external variable, visible in the
//! program as `std.extVar("name")`.

use std::env;
use std::process;

use jsonnet::Vm;

fn main() {
    let mut args = env::args().skip(1);
    let path = match args.next() {
        Some(path) => path,
        None => {
            eprintln!("usage: eval <file.jsonnet> [name=value ...]");
            process::exit(2);
        }
    };

    let mut vm = Vm::new();
    for binding in args {
        let Some((name, value)) = binding.split_once('=') else {
            eprintln!("malformed binding `{binding}`, expected name=value");
            process::exit(2);
        };
        if let Err(e) = vm.ext_var(name, value) {
            eprintln!("{e}");
            process::exit(2);
        }
    }

    match vm.evaluate_file(&path) {
        Ok(result) => print!("{result}"),
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}
