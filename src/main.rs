use std::io::{self, Read, Write};
use std::process;

fn main() {
  let mut source = Vec::new();
  if let Err(err) = io::stdin().read_to_end(&mut source) {
    eprintln!("error reading stdin: {err}");
    process::exit(1);
  }

  match mugo::compile(&source) {
    Ok(asm) => {
      // Write in one go; the assembly can be a few hundred kilobytes.
      if let Err(err) = io::stdout().write_all(asm.as_bytes()) {
        eprintln!("error writing stdout: {err}");
        process::exit(1);
      }
    }
    Err(err) => {
      eprintln!("\n{err}");
      process::exit(1);
    }
  }
}
