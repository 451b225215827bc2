use std::{fs::File, io::BufReader, path::Path};

use log::warn;
use uf2_decode_core::{
    source::{ByteSource, StreamSource},
    uf2::{UF2_BLOCK_SIZE, UF2_MAGIC_END, UF2_MAGIC_START0, UF2_MAGIC_START1, read_block},
    validate::MAX_CONFIDENCE,
};

pub fn open_source<P: AsRef<Path>>(
    input_path: P,
) -> Result<StreamSource<BufReader<File>>, Box<dyn std::error::Error>> {
    let input = BufReader::new(File::open(input_path.as_ref())?);
    Ok(StreamSource::new(input)?)
}

pub fn probe<P: AsRef<Path>>(input_path: P) -> Result<(), Box<dyn std::error::Error>> {
    let source = open_source(&input_path)?;

    let validation = match uf2_decode_core::probe(&source)? {
        Some(validation) => validation,
        None => {
            println!("{}: not a UF2 file", input_path.as_ref().display());
            return Ok(());
        }
    };

    println!(
        "{}: UF2 file, confidence {}/{}",
        input_path.as_ref().display(),
        validation.score,
        MAX_CONFIDENCE
    );
    match (validation.family, validation.family_id) {
        (Some(family), _) => println!("Family:       {}", family),
        (None, Some(id)) => println!("Family:       unknown ({:#010x})", id),
        (None, None) => println!("Family:       not specified"),
    }
    println!("Architecture: {}", validation.architecture);

    Ok(())
}

pub fn blocks<P: AsRef<Path>>(input_path: P) -> Result<(), Box<dyn std::error::Error>> {
    let source = open_source(input_path)?;
    let length = source.length()?;

    println!(
        "{:>6} {:>8} {:>10} {:>10} {:>5} {:>11} {:>10}  magic  flags",
        "index", "offset", "flags", "address", "size", "block", "family/size"
    );

    let mut offset = 0;
    let mut index = 0;
    while offset < length {
        match read_block(&source, offset) {
            Ok(block) => {
                let magic_ok = [
                    block.magic_start0 == UF2_MAGIC_START0,
                    block.magic_start1 == UF2_MAGIC_START1,
                    block.magic_end == UF2_MAGIC_END,
                ]
                .map(|ok| if ok { '+' } else { '-' });

                println!(
                    "{:>6} {:>#8x} {:>#10x} {:>#10x} {:>5} {:>5}/{:<5} {:>#10x}  {}    {}",
                    index,
                    offset,
                    block.flags,
                    block.target_addr,
                    block.payload_size,
                    block.block_no,
                    block.num_blocks,
                    block.file_size_or_family_id,
                    magic_ok.iter().collect::<String>(),
                    block.flag_names().join(",")
                );
            }
            Err(err) => warn!("Block {} at {:#x}: {}", index, offset, err),
        }

        offset += UF2_BLOCK_SIZE as u64;
        index += 1;
    }

    Ok(())
}
