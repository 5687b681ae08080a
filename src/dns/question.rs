use bitstream_io::{BitWrite, BitWriter, Endianness};

use super::{
    ParseError,
    common::{PacketComponent, WireReader, labels_to_name, name_to_labels},
    enums::{DNSResourceClass, DNSResourceType},
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSQuestion {
    pub labels: Vec<String>,
    pub qtype: DNSResourceType,
    pub qclass: DNSResourceClass,
}

impl DNSQuestion {
    pub fn new(name: &str, qtype: DNSResourceType) -> Result<Self, ParseError> {
        Ok(Self {
            labels: name_to_labels(name)?,
            qtype,
            qclass: DNSResourceClass::IN,
        })
    }

    /// Fully qualified question name, e.g. "example.com."
    pub fn name(&self) -> String {
        labels_to_name(&self.labels)
    }
}

impl PacketComponent for DNSQuestion {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError> {
        self.write_labels(writer, &self.labels)?;
        writer.write_var::<u16>(16, self.qtype.into())?;
        writer.write_var::<u16>(16, self.qclass.into())?;
        Ok(())
    }

    fn read(reader: &mut WireReader<'_>) -> Result<Self, ParseError> {
        let labels = reader
            .read_labels()
            .map_err(|_| ParseError::InvalidQuestionSection)?;
        let qtype = reader.read_u16()?.into();
        let qclass = reader.read_u16()?.into();
        Ok(DNSQuestion {
            labels,
            qtype,
            qclass,
        })
    }
}
