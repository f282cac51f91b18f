//! Line input: `rustyline` in interactive mode, plain buffered reads in
//! batch mode (spec.md §6's two runner modes).

use std::io;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

pub fn read_input_line(
    editor: &mut Option<DefaultEditor>,
    prompt: &str,
) -> io::Result<Option<String>> {
    match editor {
        Some(editor) => match editor.readline(prompt) {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(io::Error::other(err)),
        },
        None => {
            let mut line = String::new();
            let bytes = io::stdin().read_line(&mut line)?;
            if bytes == 0 {
                return Ok(None);
            }
            Ok(Some(line))
        }
    }
}
